use crate::activity;
use crate::db::{self, Workbook};
use crate::errors::{AppError, AppResult};
use crate::models::{ActivityAction, CreateProjectPayload, EntityKind, Project, StatusResponse, UpdateProjectPayload};
use crate::validation;

pub fn list(store: &Workbook) -> AppResult<Vec<Project>> {
    store.load::<Project>()
}

pub fn get(store: &Workbook, project_id: &str) -> AppResult<Project> {
    let projects = store.load::<Project>()?;
    find(&projects, project_id).cloned()
}

pub fn create(store: &Workbook, payload: CreateProjectPayload) -> AppResult<Project> {
    validation::validate_project_create(&payload)?;
    let _guard = store.lock_mutations()?;

    let mut projects = store.load::<Project>()?;
    let project = Project {
        id: db::generate_id(),
        name: payload.name,
        description: payload.description,
        status: payload.status,
        created_at: db::now_timestamp(),
    };
    projects.push(project.clone());
    store.save(&projects)?;
    activity::log_action(
        store,
        ActivityAction::Create,
        EntityKind::Project,
        &project.id,
        &format!("Added {}", project.name),
    )?;

    tracing::info!(project_id = %project.id, "project created");
    Ok(project)
}

pub fn update(store: &Workbook, project_id: &str, payload: UpdateProjectPayload) -> AppResult<Project> {
    validation::validate_project_update(&payload)?;
    let _guard = store.lock_mutations()?;

    let mut projects = store.load::<Project>()?;
    let project = find_mut(&mut projects, project_id)?;
    if let Some(name) = payload.name {
        project.name = name;
    }
    if let Some(description) = payload.description {
        project.description = description;
    }
    if let Some(status) = payload.status {
        project.status = status;
    }
    let project = project.clone();

    store.save(&projects)?;
    activity::log_action(
        store,
        ActivityAction::Update,
        EntityKind::Project,
        project_id,
        &format!("Updated {}", project.name),
    )?;

    tracing::info!(project_id = %project_id, "project updated");
    Ok(project)
}

pub fn delete(store: &Workbook, project_id: &str) -> AppResult<StatusResponse> {
    let _guard = store.lock_mutations()?;

    let projects = store.load::<Project>()?;
    let name = find(&projects, project_id)?.name.clone();
    let remaining: Vec<Project> = projects
        .into_iter()
        .filter(|project| project.id != project_id)
        .collect();

    store.save(&remaining)?;
    activity::log_action(
        store,
        ActivityAction::Delete,
        EntityKind::Project,
        project_id,
        &format!("Removed {}", name),
    )?;

    tracing::info!(project_id = %project_id, "project deleted");
    Ok(StatusResponse::deleted())
}

fn find<'a>(projects: &'a [Project], project_id: &str) -> AppResult<&'a Project> {
    projects
        .iter()
        .find(|project| project.id == project_id)
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

fn find_mut<'a>(projects: &'a mut [Project], project_id: &str) -> AppResult<&'a mut Project> {
    projects
        .iter_mut()
        .find(|project| project.id == project_id)
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}
