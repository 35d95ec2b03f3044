use crate::activity;
use crate::db::{self, Workbook};
use crate::errors::{AppError, AppResult};
use crate::models::{
    ActivityAction, CreateTeamMemberPayload, EntityKind, StatusResponse, Task, TeamMember, TeamMemberView,
    UpdateTeamMemberPayload,
};
use crate::validation;

pub fn list(store: &Workbook) -> AppResult<Vec<TeamMemberView>> {
    let members = store.load::<TeamMember>()?;
    let tasks = store.load::<Task>()?;
    Ok(members
        .into_iter()
        .map(|member| with_workload(member, &tasks))
        .collect())
}

pub fn get(store: &Workbook, member_id: &str) -> AppResult<TeamMemberView> {
    let members = store.load::<TeamMember>()?;
    let member = find(&members, member_id)?.clone();
    let tasks = store.load::<Task>()?;
    Ok(with_workload(member, &tasks))
}

pub fn create(store: &Workbook, payload: CreateTeamMemberPayload) -> AppResult<TeamMemberView> {
    validation::validate_member_create(&payload)?;
    let _guard = store.lock_mutations()?;

    let mut members = store.load::<TeamMember>()?;
    let member = TeamMember {
        id: db::generate_id(),
        name: payload.name,
        role: payload.role,
        email: payload.email,
        created_at: db::now_timestamp(),
    };
    members.push(member.clone());
    store.save(&members)?;
    activity::log_action(
        store,
        ActivityAction::Create,
        EntityKind::TeamMember,
        &member.id,
        &format!("Added {}", member.name),
    )?;

    tracing::info!(member_id = %member.id, "team member created");
    Ok(TeamMemberView { member, workload: 0 })
}

pub fn update(store: &Workbook, member_id: &str, payload: UpdateTeamMemberPayload) -> AppResult<TeamMemberView> {
    validation::validate_member_update(&payload)?;
    let _guard = store.lock_mutations()?;

    let mut members = store.load::<TeamMember>()?;
    let member = find_mut(&mut members, member_id)?;
    if let Some(name) = payload.name {
        member.name = name;
    }
    if let Some(role) = payload.role {
        member.role = role;
    }
    if let Some(email) = payload.email {
        member.email = email;
    }
    let member = member.clone();

    store.save(&members)?;
    activity::log_action(
        store,
        ActivityAction::Update,
        EntityKind::TeamMember,
        member_id,
        &format!("Updated {}", member.name),
    )?;

    tracing::info!(member_id = %member_id, "team member updated");
    let tasks = store.load::<Task>()?;
    Ok(with_workload(member, &tasks))
}

/// Removes the member row only; tasks keep their (now dangling) assignee id.
pub fn delete(store: &Workbook, member_id: &str) -> AppResult<StatusResponse> {
    let _guard = store.lock_mutations()?;

    let members = store.load::<TeamMember>()?;
    let name = find(&members, member_id)?.name.clone();
    let remaining: Vec<TeamMember> = members.into_iter().filter(|member| member.id != member_id).collect();

    store.save(&remaining)?;
    activity::log_action(
        store,
        ActivityAction::Delete,
        EntityKind::TeamMember,
        member_id,
        &format!("Removed {}", name),
    )?;

    tracing::info!(member_id = %member_id, "team member deleted");
    Ok(StatusResponse::deleted())
}

/// Number of tasks assigned to `member_id` that are not completed.
pub fn workload(member_id: &str, tasks: &[Task]) -> usize {
    tasks
        .iter()
        .filter(|task| task.assignee_id == member_id && !task.status.is_completed())
        .count()
}

fn with_workload(member: TeamMember, tasks: &[Task]) -> TeamMemberView {
    let workload = workload(&member.id, tasks);
    TeamMemberView { member, workload }
}

fn find<'a>(members: &'a [TeamMember], member_id: &str) -> AppResult<&'a TeamMember> {
    members
        .iter()
        .find(|member| member.id == member_id)
        .ok_or_else(|| AppError::NotFound("Team member not found".to_string()))
}

fn find_mut<'a>(members: &'a mut [TeamMember], member_id: &str) -> AppResult<&'a mut TeamMember> {
    members
        .iter_mut()
        .find(|member| member.id == member_id)
        .ok_or_else(|| AppError::NotFound("Team member not found".to_string()))
}
