use crate::db::{self, Workbook};
use crate::errors::AppResult;
use crate::models::{
    MemberProductivity, MetricsResponse, PendingVsCompleted, Project, ProjectProgress, Task, TeamMember,
};

/// Recomputes every metric from freshly read sheets.
pub fn metrics(store: &Workbook) -> AppResult<MetricsResponse> {
    let tasks = store.load::<Task>()?;
    let projects = store.load::<Project>()?;
    let members = store.load::<TeamMember>()?;
    Ok(compute(&tasks, &projects, &members, &db::today_date()))
}

/// `today` is a `YYYY-MM-DD` UTC date.
pub fn compute(tasks: &[Task], projects: &[Project], members: &[TeamMember], today: &str) -> MetricsResponse {
    let completed = tasks.iter().filter(|task| task.status.is_completed()).count();
    let completed_today = tasks
        .iter()
        .filter(|task| task.status.is_completed() && task.updated_at.starts_with(today))
        .count();
    let overdue = tasks
        .iter()
        .filter(|task| {
            !task.due_date.is_empty() && task.due_date.as_str() < today && !task.status.is_completed()
        })
        .count();

    let project_progress = projects
        .iter()
        .map(|project| {
            let (total, done) = tally(tasks.iter().filter(|task| task.project_id == project.id));
            ProjectProgress {
                project_id: project.id.clone(),
                name: project.name.clone(),
                progress: percentage(done, total),
            }
        })
        .collect();

    let member_productivity = members
        .iter()
        .map(|member| {
            let (_, done) = tally(tasks.iter().filter(|task| task.assignee_id == member.id));
            MemberProductivity {
                member_id: member.id.clone(),
                name: member.name.clone(),
                completed: done,
            }
        })
        .collect();

    MetricsResponse {
        completed_today,
        pending_vs_completed: PendingVsCompleted {
            pending: tasks.len() - completed,
            completed,
        },
        overdue,
        project_progress,
        member_productivity,
    }
}

fn tally<'a>(tasks: impl Iterator<Item = &'a Task>) -> (usize, usize) {
    tasks.fold((0, 0), |(total, done), task| {
        (total + 1, done + usize::from(task.status.is_completed()))
    })
}

/// Truncated integer percentage; 0 when there is nothing to count.
fn percentage(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (done * 100 / total) as u32
}
