use crate::db::MAX_CELL_CHARS;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateProjectPayload, CreateTaskPayload, CreateTeamMemberPayload, UpdateProjectPayload, UpdateTaskPayload,
    UpdateTeamMemberPayload,
};

pub const DEFAULT_ACTIVITY_LIMIT: u32 = 50;
const MIN_ACTIVITY_LIMIT: u32 = 1;
const MAX_ACTIVITY_LIMIT: u32 = 200;

pub fn validate_member_create(payload: &CreateTeamMemberPayload) -> AppResult<()> {
    require_non_empty("name", &payload.name)?;
    require_non_empty("role", &payload.role)?;
    require_non_empty("email", &payload.email)?;
    require_fits(&[
        ("name", Some(&payload.name)),
        ("role", Some(&payload.role)),
        ("email", Some(&payload.email)),
    ])
}

pub fn validate_member_update(payload: &UpdateTeamMemberPayload) -> AppResult<()> {
    require_fits(&[
        ("name", payload.name.as_ref()),
        ("role", payload.role.as_ref()),
        ("email", payload.email.as_ref()),
    ])
}

pub fn validate_project_create(payload: &CreateProjectPayload) -> AppResult<()> {
    require_non_empty("name", &payload.name)?;
    require_fits(&[
        ("name", Some(&payload.name)),
        ("description", Some(&payload.description)),
        ("status", Some(&payload.status)),
    ])
}

pub fn validate_project_update(payload: &UpdateProjectPayload) -> AppResult<()> {
    require_fits(&[
        ("name", payload.name.as_ref()),
        ("description", payload.description.as_ref()),
        ("status", payload.status.as_ref()),
    ])
}

pub fn validate_task_create(payload: &CreateTaskPayload) -> AppResult<()> {
    require_non_empty("title", &payload.title)?;
    require_fits(&[
        ("title", Some(&payload.title)),
        ("description", Some(&payload.description)),
        ("due_date", payload.due_date.as_ref()),
        ("reminder_date", payload.reminder_date.as_ref()),
        ("assignee_id", payload.assignee_id.as_ref()),
        ("project_id", payload.project_id.as_ref()),
        ("comments", Some(&payload.comments)),
        ("updated_by", Some(&payload.updated_by)),
    ])
}

pub fn validate_task_update(payload: &UpdateTaskPayload) -> AppResult<()> {
    require_fits(&[
        ("title", payload.title.as_ref()),
        ("description", payload.description.as_ref()),
        ("due_date", payload.due_date.as_ref()),
        ("reminder_date", payload.reminder_date.as_ref()),
        ("assignee_id", payload.assignee_id.as_ref()),
        ("project_id", payload.project_id.as_ref()),
        ("comments", payload.comments.as_ref()),
        ("updated_by", Some(&payload.updated_by)),
    ])
}

pub fn activity_limit(limit: Option<u32>) -> AppResult<usize> {
    let limit = limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    if !(MIN_ACTIVITY_LIMIT..=MAX_ACTIVITY_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between {} and {}, got {}",
            MIN_ACTIVITY_LIMIT, MAX_ACTIVITY_LIMIT, limit
        )));
    }
    Ok(limit as usize)
}

/// At least one character; whitespace counts.
fn require_non_empty(field: &str, value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Client text must fit in a single worksheet cell.
fn require_fits(fields: &[(&str, Option<&String>)]) -> AppResult<()> {
    for (field, value) in fields {
        let Some(value) = value else {
            continue;
        };
        let chars = value.chars().count();
        if chars > MAX_CELL_CHARS {
            return Err(AppError::Validation(format!(
                "{} must be at most {} characters, got {}",
                field, MAX_CELL_CHARS, chars
            )));
        }
    }
    Ok(())
}
