use crate::db::{self, Workbook};
use crate::errors::AppResult;
use crate::models::{ActivityAction, ActivityLogEntry, EntityKind};
use crate::validation;

/// Appends one entry to the activity log sheet. Failures propagate to the
/// caller even though the triggering mutation has already been written.
pub fn log_action(
    store: &Workbook,
    action: ActivityAction,
    entity_type: EntityKind,
    entity_id: &str,
    details: &str,
) -> AppResult<ActivityLogEntry> {
    let mut entries = store.load::<ActivityLogEntry>()?;
    let entry = ActivityLogEntry {
        id: db::generate_id(),
        timestamp: db::now_timestamp(),
        action,
        entity_type,
        entity_id: entity_id.to_string(),
        details: details.to_string(),
    };
    entries.push(entry.clone());
    store.save(&entries)?;

    tracing::info!(
        action = action.as_str(),
        entity_type = entity_type.as_str(),
        entity_id = %entity_id,
        "activity recorded"
    );
    Ok(entry)
}

/// Most recent entries first.
pub fn recent(store: &Workbook, limit: Option<u32>) -> AppResult<Vec<ActivityLogEntry>> {
    let limit = validation::activity_limit(limit)?;
    let entries = store.load::<ActivityLogEntry>()?;
    Ok(entries.into_iter().rev().take(limit).collect())
}
