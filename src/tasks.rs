use crate::activity;
use crate::db::{self, Workbook};
use crate::errors::{AppError, AppResult};
use crate::models::{
    ActivityAction, CreateTaskPayload, EntityKind, StatusResponse, Task, TaskFilters, UpdateTaskPayload,
};
use crate::validation;

pub fn list(store: &Workbook, filters: &TaskFilters) -> AppResult<Vec<Task>> {
    let tasks = store.load::<Task>()?;
    Ok(apply_filters(tasks, filters))
}

pub fn get(store: &Workbook, task_id: &str) -> AppResult<Task> {
    let tasks = store.load::<Task>()?;
    find(&tasks, task_id).cloned()
}

pub fn create(store: &Workbook, payload: CreateTaskPayload) -> AppResult<Task> {
    validation::validate_task_create(&payload)?;
    let _guard = store.lock_mutations()?;

    let mut tasks = store.load::<Task>()?;
    let timestamp = db::now_timestamp();
    let task = Task {
        id: db::generate_id(),
        history: history_entry(&timestamp, &payload.updated_by, "created task"),
        title: payload.title,
        description: payload.description,
        status: payload.status,
        priority: payload.priority,
        due_date: payload.due_date.unwrap_or_default(),
        reminder_date: payload.reminder_date.unwrap_or_default(),
        assignee_id: payload.assignee_id.unwrap_or_default(),
        project_id: payload.project_id.unwrap_or_default(),
        comments: payload.comments,
        created_at: timestamp.clone(),
        updated_at: timestamp,
    };
    tasks.push(task.clone());
    store.save(&tasks)?;
    activity::log_action(
        store,
        ActivityAction::Create,
        EntityKind::Task,
        &task.id,
        &format!("Added {}", task.title),
    )?;

    tracing::info!(task_id = %task.id, "task created");
    Ok(task)
}

/// Applies the supplied fields, appends a history line for `updated_by` and
/// refreshes `updated_at`. Earlier history lines are never rewritten.
pub fn update(store: &Workbook, task_id: &str, payload: UpdateTaskPayload) -> AppResult<Task> {
    validation::validate_task_update(&payload)?;
    let _guard = store.lock_mutations()?;

    let mut tasks = store.load::<Task>()?;
    let task = find_mut(&mut tasks, task_id)?;
    let UpdateTaskPayload {
        title,
        description,
        status,
        priority,
        due_date,
        reminder_date,
        assignee_id,
        project_id,
        comments,
        updated_by,
    } = payload;

    if let Some(title) = title {
        task.title = title;
    }
    if let Some(description) = description {
        task.description = description;
    }
    if let Some(status) = status {
        task.status = status;
    }
    if let Some(priority) = priority {
        task.priority = priority;
    }
    if let Some(due_date) = due_date {
        task.due_date = due_date;
    }
    if let Some(reminder_date) = reminder_date {
        task.reminder_date = reminder_date;
    }
    if let Some(assignee_id) = assignee_id {
        task.assignee_id = assignee_id;
    }
    if let Some(project_id) = project_id {
        task.project_id = project_id;
    }
    if let Some(comments) = comments {
        task.comments = comments;
    }

    let timestamp = db::now_timestamp();
    let entry = history_entry(&timestamp, &updated_by, "updated task");
    task.history = format!("{}\n{}", task.history, entry).trim().to_string();
    task.updated_at = timestamp;
    let task = task.clone();

    store.save(&tasks)?;
    activity::log_action(
        store,
        ActivityAction::Update,
        EntityKind::Task,
        task_id,
        &format!("Updated {}", task.title),
    )?;

    tracing::info!(task_id = %task_id, updated_by = %updated_by, "task updated");
    Ok(task)
}

pub fn delete(store: &Workbook, task_id: &str) -> AppResult<StatusResponse> {
    let _guard = store.lock_mutations()?;

    let tasks = store.load::<Task>()?;
    let title = find(&tasks, task_id)?.title.clone();
    let remaining: Vec<Task> = tasks.into_iter().filter(|task| task.id != task_id).collect();

    store.save(&remaining)?;
    activity::log_action(
        store,
        ActivityAction::Delete,
        EntityKind::Task,
        task_id,
        &format!("Removed {}", title),
    )?;

    tracing::info!(task_id = %task_id, "task deleted");
    Ok(StatusResponse::deleted())
}

/// Narrows `tasks` by every present filter in turn. Row order is preserved.
/// Due-date bounds compare ISO strings and never match an empty due date.
pub fn apply_filters(mut tasks: Vec<Task>, filters: &TaskFilters) -> Vec<Task> {
    if let Some(assignee_id) = filters.assignee_id.as_deref() {
        tasks.retain(|task| task.assignee_id == assignee_id);
    }
    if let Some(project_id) = filters.project_id.as_deref() {
        tasks.retain(|task| task.project_id == project_id);
    }
    if let Some(status) = filters.status {
        tasks.retain(|task| task.status == status);
    }
    if let Some(priority) = filters.priority {
        tasks.retain(|task| task.priority == priority);
    }
    if let Some(due_before) = filters.due_before.as_deref() {
        tasks.retain(|task| !task.due_date.is_empty() && task.due_date.as_str() <= due_before);
    }
    if let Some(due_after) = filters.due_after.as_deref() {
        tasks.retain(|task| !task.due_date.is_empty() && task.due_date.as_str() >= due_after);
    }
    if let Some(search) = filters.search.as_deref() {
        let needle = search.to_lowercase();
        tasks.retain(|task| {
            [&task.title, &task.description, &task.comments]
                .iter()
                .any(|haystack| haystack.to_lowercase().contains(&needle))
        });
    }
    tasks
}

fn history_entry(timestamp: &str, actor: &str, action: &str) -> String {
    format!("{} - {} {}", timestamp, actor, action)
}

fn find<'a>(tasks: &'a [Task], task_id: &str) -> AppResult<&'a Task> {
    tasks
        .iter()
        .find(|task| task.id == task_id)
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

fn find_mut<'a>(tasks: &'a mut [Task], task_id: &str) -> AppResult<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|task| task.id == task_id)
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityLogEntry, TaskPriority, TaskStatus};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn temp_store() -> (tempfile::TempDir, Workbook) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Workbook::new(&dir.path().join("task_manager.xlsx")).expect("workbook");
        (dir, store)
    }

    fn task(id: &str, title: &str, status: TaskStatus, priority: TaskPriority, due_date: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            status,
            priority,
            due_date: due_date.to_string(),
            reminder_date: String::new(),
            assignee_id: String::new(),
            project_id: String::new(),
            comments: String::new(),
            history: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn sample_tasks() -> Vec<Task> {
        let mut tasks = vec![
            task("t1", "Write docs", TaskStatus::Pending, TaskPriority::High, "2023-12-15"),
            task("t2", "Fix login", TaskStatus::Completed, TaskPriority::High, "2024-02-01"),
            task("t3", "Plan sprint", TaskStatus::Pending, TaskPriority::Low, ""),
            task("t4", "Review PR", TaskStatus::Blocked, TaskPriority::High, "2024-01-01"),
        ];
        tasks[0].assignee_id = "ann".to_string();
        tasks[1].assignee_id = "ann".to_string();
        tasks[2].description = "Includes LOGIN audit".to_string();
        tasks[3].comments = "waiting on login service".to_string();
        tasks[3].project_id = "p1".to_string();
        tasks
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn create_seeds_defaults_and_history() {
        let (_dir, store) = temp_store();
        let mut payload = CreateTaskPayload::titled("Fix bug");
        payload.updated_by = "ann".to_string();
        let created = create(&store, payload).expect("create");

        assert_eq!(created.status, TaskStatus::Pending);
        assert_eq!(created.priority, TaskPriority::Medium);
        assert_eq!(created.due_date, "");
        assert_eq!(created.assignee_id, "");
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.history, format!("{} - ann created task", created.created_at));
        assert_eq!(get(&store, &created.id).expect("get"), created);
    }

    #[test]
    fn update_appends_history_without_rewriting_it() {
        let (_dir, store) = temp_store();
        let created = create(&store, CreateTaskPayload::titled("Fix bug")).expect("create");

        let first = update(
            &store,
            &created.id,
            UpdateTaskPayload {
                status: Some(TaskStatus::InProgress),
                updated_by: "bob".to_string(),
                ..UpdateTaskPayload::default()
            },
        )
        .expect("first update");
        let second = update(&store, &created.id, UpdateTaskPayload::default()).expect("second update");

        let lines: Vec<&str> = second.history.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], created.history);
        assert!(lines[1].ends_with(" - bob updated task"));
        assert!(lines[2].ends_with(" - system updated task"));
        assert!(second.history.starts_with(&first.history));

        assert_eq!(second.status, TaskStatus::InProgress);
        assert_eq!(second.title, "Fix bug");
        assert_eq!(second.created_at, created.created_at);
    }

    #[test]
    fn update_and_delete_of_unknown_task_are_not_found() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            update(&store, "nope", UpdateTaskPayload::default()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(delete(&store, "nope"), Err(AppError::NotFound(_))));
        assert!(store.load::<ActivityLogEntry>().expect("log").is_empty());
    }

    #[test]
    fn delete_then_lookup_is_not_found() {
        let (_dir, store) = temp_store();
        let created = create(&store, CreateTaskPayload::titled("Temp")).expect("create");
        delete(&store, &created.id).expect("delete");
        assert!(matches!(get(&store, &created.id), Err(AppError::NotFound(_))));
        assert!(list(&store, &TaskFilters::default()).expect("list").is_empty());
    }

    #[test]
    fn created_ids_are_unique() {
        let (_dir, store) = temp_store();
        for index in 0..5 {
            create(&store, CreateTaskPayload::titled(&format!("Task {}", index))).expect("create");
        }
        let tasks = list(&store, &TaskFilters::default()).expect("list");
        let unique: HashSet<&str> = ids(&tasks).into_iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn concurrent_creates_lose_no_rows() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    create(&store, CreateTaskPayload::titled(&format!("Task {}", index))).map(|task| task.id)
                })
            })
            .collect();

        let mut created_ids = HashSet::new();
        for handle in handles {
            created_ids.insert(handle.join().expect("worker thread").expect("create"));
        }
        assert_eq!(created_ids.len(), 8);

        let stored = store.load::<Task>().expect("tasks");
        let stored_ids: HashSet<String> = stored.into_iter().map(|task| task.id).collect();
        assert_eq!(stored_ids, created_ids);
        assert_eq!(store.load::<ActivityLogEntry>().expect("log").len(), 8);
    }

    #[test]
    fn history_keeps_growing_past_one_cell() {
        let (_dir, store) = temp_store();
        let created = create(&store, CreateTaskPayload::titled("Long lived")).expect("create");
        let mut stored = store.load::<Task>().expect("load");
        stored[0].history = format!("{}\n{}", "x".repeat(db::MAX_CELL_CHARS - 10), created.history);
        store.save(&stored).expect("seed long history");

        let actor = "a".repeat(2_000);
        for _ in 0..3 {
            update(
                &store,
                &created.id,
                UpdateTaskPayload {
                    updated_by: actor.clone(),
                    ..UpdateTaskPayload::default()
                },
            )
            .expect("update past the cell limit");
        }

        let task = get(&store, &created.id).expect("get");
        assert!(task.history.chars().count() > db::MAX_CELL_CHARS);
        assert_eq!(task.history.lines().count(), 5);
        assert!(task.history.starts_with(&stored[0].history));
        assert!(task.history.ends_with(&format!("{} updated task", actor)));
    }

    #[test]
    fn cell_sized_title_is_logged_in_full() {
        let (_dir, store) = temp_store();
        let title = "t".repeat(db::MAX_CELL_CHARS);
        let created = create(&store, CreateTaskPayload::titled(&title)).expect("create");
        assert_eq!(get(&store, &created.id).expect("get").title, title);

        let entries = store.load::<ActivityLogEntry>().expect("log");
        assert_eq!(entries[0].details, format!("Added {}", title));
    }

    #[test]
    fn overlong_fields_are_rejected_before_any_write() {
        let (_dir, store) = temp_store();
        let mut payload = CreateTaskPayload::titled("Huge");
        payload.description = "d".repeat(40_000);
        assert!(matches!(create(&store, payload), Err(AppError::Validation(_))));

        let created = create(&store, CreateTaskPayload::titled("Small")).expect("create");
        let result = update(
            &store,
            &created.id,
            UpdateTaskPayload {
                comments: Some("c".repeat(40_000)),
                ..UpdateTaskPayload::default()
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(get(&store, &created.id).expect("get"), created);
        assert_eq!(store.load::<ActivityLogEntry>().expect("log").len(), 1);
    }

    #[test]
    fn due_before_skips_empty_and_later_dates() {
        let filters = TaskFilters {
            due_before: Some("2024-01-01".to_string()),
            ..TaskFilters::default()
        };
        assert_eq!(ids(&apply_filters(sample_tasks(), &filters)), vec!["t1", "t4"]);
    }

    #[test]
    fn due_after_skips_empty_dates() {
        let filters = TaskFilters {
            due_after: Some("2024-01-01".to_string()),
            ..TaskFilters::default()
        };
        assert_eq!(ids(&apply_filters(sample_tasks(), &filters)), vec!["t2", "t4"]);
    }

    #[test]
    fn search_is_case_insensitive_across_text_fields() {
        let filters = TaskFilters {
            search: Some("Login".to_string()),
            ..TaskFilters::default()
        };
        assert_eq!(ids(&apply_filters(sample_tasks(), &filters)), vec!["t2", "t3", "t4"]);
    }

    #[test]
    fn filters_compose_as_intersection() {
        let by_status = TaskFilters {
            status: Some(TaskStatus::Pending),
            ..TaskFilters::default()
        };
        let by_priority = TaskFilters {
            priority: Some(TaskPriority::High),
            ..TaskFilters::default()
        };
        let both = TaskFilters {
            status: Some(TaskStatus::Pending),
            priority: Some(TaskPriority::High),
            ..TaskFilters::default()
        };

        let status_ids = ids(&apply_filters(sample_tasks(), &by_status))
            .into_iter()
            .map(str::to_string)
            .collect::<HashSet<_>>();
        let combined = apply_filters(sample_tasks(), &both);
        let priority_matches = apply_filters(sample_tasks(), &by_priority);
        let expected: Vec<&str> = ids(&priority_matches)
            .into_iter()
            .filter(|id| status_ids.contains(*id))
            .collect();
        assert_eq!(ids(&combined), expected);
        assert_eq!(ids(&combined), vec!["t1"]);
    }

    #[test]
    fn exact_match_filters_on_references() {
        let filters = TaskFilters {
            assignee_id: Some("ann".to_string()),
            ..TaskFilters::default()
        };
        assert_eq!(ids(&apply_filters(sample_tasks(), &filters)), vec!["t1", "t2"]);

        let filters = TaskFilters {
            project_id: Some("p1".to_string()),
            ..TaskFilters::default()
        };
        assert_eq!(ids(&apply_filters(sample_tasks(), &filters)), vec!["t4"]);
    }
}
