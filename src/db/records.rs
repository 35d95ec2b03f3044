use super::{Row, SheetKind, SheetRecord};
use crate::errors::{AppError, AppResult};
use crate::models::{ActivityLogEntry, Project, Task, TeamMember};
use std::str::FromStr;

impl SheetRecord for TeamMember {
    const SHEET: SheetKind = SheetKind::TeamMembers;

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: field(row, "id"),
            name: field(row, "name"),
            role: field(row, "role"),
            email: field(row, "email"),
            created_at: field(row, "created_at"),
        })
    }

    fn to_row(&self) -> Row {
        to_row(&[
            ("id", self.id.as_str()),
            ("name", self.name.as_str()),
            ("role", self.role.as_str()),
            ("email", self.email.as_str()),
            ("created_at", self.created_at.as_str()),
        ])
    }
}

impl SheetRecord for Project {
    const SHEET: SheetKind = SheetKind::Projects;

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: field(row, "id"),
            name: field(row, "name"),
            description: field(row, "description"),
            status: field(row, "status"),
            created_at: field(row, "created_at"),
        })
    }

    fn to_row(&self) -> Row {
        to_row(&[
            ("id", self.id.as_str()),
            ("name", self.name.as_str()),
            ("description", self.description.as_str()),
            ("status", self.status.as_str()),
            ("created_at", self.created_at.as_str()),
        ])
    }
}

impl SheetRecord for Task {
    const SHEET: SheetKind = SheetKind::Tasks;

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: field(row, "id"),
            title: field(row, "title"),
            description: field(row, "description"),
            status: parse_field(Self::SHEET, row, "status")?,
            priority: parse_field(Self::SHEET, row, "priority")?,
            due_date: field(row, "due_date"),
            reminder_date: field(row, "reminder_date"),
            assignee_id: field(row, "assignee_id"),
            project_id: field(row, "project_id"),
            comments: field(row, "comments"),
            history: field(row, "history"),
            created_at: field(row, "created_at"),
            updated_at: field(row, "updated_at"),
        })
    }

    fn to_row(&self) -> Row {
        to_row(&[
            ("id", self.id.as_str()),
            ("title", self.title.as_str()),
            ("description", self.description.as_str()),
            ("status", self.status.as_str()),
            ("priority", self.priority.as_str()),
            ("due_date", self.due_date.as_str()),
            ("reminder_date", self.reminder_date.as_str()),
            ("assignee_id", self.assignee_id.as_str()),
            ("project_id", self.project_id.as_str()),
            ("comments", self.comments.as_str()),
            ("history", self.history.as_str()),
            ("created_at", self.created_at.as_str()),
            ("updated_at", self.updated_at.as_str()),
        ])
    }
}

impl SheetRecord for ActivityLogEntry {
    const SHEET: SheetKind = SheetKind::ActivityLogs;

    fn from_row(row: &Row) -> AppResult<Self> {
        Ok(Self {
            id: field(row, "id"),
            timestamp: field(row, "timestamp"),
            action: parse_field(Self::SHEET, row, "action")?,
            entity_type: parse_field(Self::SHEET, row, "entity_type")?,
            entity_id: field(row, "entity_id"),
            details: field(row, "details"),
        })
    }

    fn to_row(&self) -> Row {
        to_row(&[
            ("id", self.id.as_str()),
            ("timestamp", self.timestamp.as_str()),
            ("action", self.action.as_str()),
            ("entity_type", self.entity_type.as_str()),
            ("entity_id", self.entity_id.as_str()),
            ("details", self.details.as_str()),
        ])
    }
}

fn field(row: &Row, column: &str) -> String {
    row.get(column).cloned().unwrap_or_default()
}

fn parse_field<T>(sheet: SheetKind, row: &Row, column: &str) -> AppResult<T>
where
    T: FromStr<Err = String>,
{
    let raw = field(row, column);
    raw.parse::<T>().map_err(|error| {
        AppError::Storage(format!(
            "unexpected value in '{}' row {}: {}",
            sheet.name(),
            field(row, "id"),
            error
        ))
    })
}

fn to_row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityAction, EntityKind, TaskPriority, TaskStatus};

    fn sample_task() -> Task {
        Task {
            id: "t1".to_string(),
            title: "Fix bug".to_string(),
            description: String::new(),
            status: TaskStatus::InProgress,
            priority: TaskPriority::Urgent,
            due_date: "2024-03-01".to_string(),
            reminder_date: String::new(),
            assignee_id: "m1".to_string(),
            project_id: String::new(),
            comments: String::new(),
            history: "2024-01-01T00:00:00Z - system created task".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn task_row_covers_every_column() {
        let row = sample_task().to_row();
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let mut expected = SheetKind::Tasks.columns().to_vec();
        expected.sort_unstable();
        assert_eq!(columns, expected);
        assert_eq!(row["status"], "In Progress");
        assert_eq!(Task::from_row(&row).expect("parse"), sample_task());
    }

    #[test]
    fn missing_cells_become_empty_strings() {
        let mut row = Row::new();
        row.insert("id".to_string(), "m1".to_string());
        let member = TeamMember::from_row(&row).expect("member");
        assert_eq!(member.name, "");
        assert_eq!(member.created_at, "");
    }

    #[test]
    fn unknown_task_status_is_a_storage_error() {
        let mut row = sample_task().to_row();
        row.insert("status".to_string(), "Someday".to_string());
        let error = Task::from_row(&row).expect_err("bad status");
        assert!(matches!(error, AppError::Storage(message) if message.contains("Someday")));
    }

    #[test]
    fn activity_entry_round_trips() {
        let entry = ActivityLogEntry {
            id: "a1".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            action: ActivityAction::Delete,
            entity_type: EntityKind::TeamMember,
            entity_id: "m1".to_string(),
            details: "Removed Ann".to_string(),
        };
        let row = entry.to_row();
        assert_eq!(row["entity_type"], "team_member");
        assert_eq!(ActivityLogEntry::from_row(&row).expect("parse"), entry);
    }
}
