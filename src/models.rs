use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_ACTOR: &str = "system";
pub const DEFAULT_PROJECT_STATUS: &str = "Active";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::Pending, Self::InProgress, Self::Completed, Self::Blocked];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Blocked => "Blocked",
        }
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| format!("invalid task status '{}'", raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == raw)
            .ok_or_else(|| format!("invalid task priority '{}'", raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("invalid activity action '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    TeamMember,
    Project,
    Task,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TeamMember => "team_member",
            Self::Project => "project",
            Self::Task => "task",
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "team_member" => Ok(Self::TeamMember),
            "project" => Ok(Self::Project),
            "task" => Ok(Self::Task),
            other => Err(format!("invalid entity type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: String,
    pub email: String,
    pub created_at: String,
}

/// Team member as returned by the API, with the derived open-task count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMemberView {
    #[serde(flatten)]
    pub member: TeamMember,
    pub workload: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: String,
    pub reminder_date: String,
    pub assignee_id: String,
    pub project_id: String,
    pub comments: String,
    pub history: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: String,
    pub timestamp: String,
    pub action: ActivityAction,
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeamMemberPayload {
    pub name: String,
    pub role: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateTeamMemberPayload {
    pub name: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_project_status")]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateProjectPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub reminder_date: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub comments: String,
    #[serde(default = "default_actor")]
    pub updated_by: String,
}

impl CreateTaskPayload {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            description: String::new(),
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_date: None,
            reminder_date: None,
            assignee_id: None,
            project_id: None,
            comments: String::new(),
            updated_by: default_actor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaskPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub reminder_date: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default = "default_actor")]
    pub updated_by: String,
}

impl Default for UpdateTaskPayload {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            status: None,
            priority: None,
            due_date: None,
            reminder_date: None,
            assignee_id: None,
            project_id: None,
            comments: None,
            updated_by: default_actor(),
        }
    }
}

/// Query filters for the task list. Empty parameters count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilters {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub assignee_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub project_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub due_before: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub due_after: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn deleted() -> Self {
        Self {
            status: "deleted".to_string(),
        }
    }

    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVsCompleted {
    pub pending: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub project_id: String,
    pub name: String,
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProductivity {
    pub member_id: String,
    pub name: String,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub completed_today: usize,
    pub pending_vs_completed: PendingVsCompleted,
    pub overdue: usize,
    pub project_progress: Vec<ProjectProgress>,
    pub member_productivity: Vec<MemberProductivity>,
}

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

fn default_project_status() -> String {
    DEFAULT_PROJECT_STATUS.to_string()
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_status_uses_display_names_on_the_wire() {
        assert_eq!(serde_json::to_value(TaskStatus::InProgress).expect("serialize"), json!("In Progress"));
        let parsed: TaskStatus = serde_json::from_value(json!("Blocked")).expect("deserialize");
        assert_eq!(parsed, TaskStatus::Blocked);
        assert!(serde_json::from_value::<TaskStatus>(json!("in progress")).is_err());
        assert_eq!("In Progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
    }

    #[test]
    fn create_task_payload_fills_defaults() {
        let payload: CreateTaskPayload = serde_json::from_value(json!({"title": "Fix bug"})).expect("payload");
        assert_eq!(payload.status, TaskStatus::Pending);
        assert_eq!(payload.priority, TaskPriority::Medium);
        assert_eq!(payload.updated_by, "system");
        assert_eq!(payload.description, "");
        assert!(payload.due_date.is_none());
    }

    #[test]
    fn create_task_payload_rejects_unknown_priority() {
        let result = serde_json::from_value::<CreateTaskPayload>(json!({"title": "x", "priority": "Critical"}));
        assert!(result.is_err());
    }

    #[test]
    fn update_payload_treats_null_as_absent() {
        let payload: UpdateTaskPayload =
            serde_json::from_value(json!({"title": null, "status": "Completed"})).expect("payload");
        assert!(payload.title.is_none());
        assert_eq!(payload.status, Some(TaskStatus::Completed));
        assert_eq!(payload.updated_by, "system");
    }

    #[test]
    fn project_payload_defaults_to_active() {
        let payload: CreateProjectPayload = serde_json::from_value(json!({"name": "Launch"})).expect("payload");
        assert_eq!(payload.status, "Active");
    }

    #[test]
    fn member_view_flattens_member_fields() {
        let view = TeamMemberView {
            member: TeamMember {
                id: "m1".to_string(),
                name: "Ann".to_string(),
                role: "Eng".to_string(),
                email: "a@x.com".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
            },
            workload: 2,
        };
        let value = serde_json::to_value(&view).expect("serialize");
        assert_eq!(value["name"], "Ann");
        assert_eq!(value["workload"], 2);
    }
}
