use crate::errors::{AppError, AppResult};

const TEAM_MEMBER_COLUMNS: &[&str] = &["id", "name", "role", "email", "created_at"];
const PROJECT_COLUMNS: &[&str] = &["id", "name", "description", "status", "created_at"];
const TASK_COLUMNS: &[&str] = &[
    "id",
    "title",
    "description",
    "status",
    "priority",
    "due_date",
    "reminder_date",
    "assignee_id",
    "project_id",
    "comments",
    "history",
    "created_at",
    "updated_at",
];
const ACTIVITY_LOG_COLUMNS: &[&str] = &["id", "timestamp", "action", "entity_type", "entity_id", "details"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SheetKind {
    TeamMembers,
    Projects,
    Tasks,
    ActivityLogs,
}

impl SheetKind {
    /// Workbook order of the sheets.
    pub const ALL: [SheetKind; 4] = [Self::TeamMembers, Self::Projects, Self::Tasks, Self::ActivityLogs];

    pub fn name(self) -> &'static str {
        match self {
            Self::TeamMembers => "Team Members",
            Self::Projects => "Projects",
            Self::Tasks => "Tasks",
            Self::ActivityLogs => "Activity Logs",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::TeamMembers => TEAM_MEMBER_COLUMNS,
            Self::Projects => PROJECT_COLUMNS,
            Self::Tasks => TASK_COLUMNS,
            Self::ActivityLogs => ACTIVITY_LOG_COLUMNS,
        }
    }

    pub fn from_name(name: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| AppError::UnknownSheet(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_resolve_to_kinds() {
        for kind in SheetKind::ALL {
            assert_eq!(SheetKind::from_name(kind.name()).expect("known sheet"), kind);
            assert_eq!(kind.columns()[0], "id");
        }
    }

    #[test]
    fn unknown_sheet_name_is_rejected() {
        let error = SheetKind::from_name("Invoices").expect_err("unknown sheet");
        assert!(matches!(error, AppError::UnknownSheet(name) if name == "Invoices"));
    }
}
