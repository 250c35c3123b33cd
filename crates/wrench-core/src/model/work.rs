//! The work-item aggregate.
//!
//! A [`WorkItem`] is keyed by domain + work id, holds its current
//! [`Status`] plus an append-only history (oldest first), and maps field
//! ids to [`CustomFieldValue`]s. Status is mutated only through the
//! workflow engine; [`WorkItem::commit_status`] is crate-private for that
//! reason. A parent is referenced by id only: a weak back-reference,
//! never an owning pointer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::state::WorkflowState;
use crate::model::value::CustomFieldValue;

/// One applied status: state, free-text comment, and when it was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub state: WorkflowState,
    pub comment: String,
    pub at: DateTime<Utc>,
}

impl Status {
    #[must_use]
    pub fn new(state: WorkflowState, comment: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            state,
            comment: comment.into(),
            at,
        }
    }
}

/// A trackable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub domain_id: String,
    pub work_id: String,
    /// Weak back-reference to the parent work item, by id only.
    #[serde(default)]
    pub parent_work_id: Option<String>,
    pub work_type_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Current status. Always the most recently applied transition.
    pub status: Status,
    /// Superseded statuses, oldest first. The engine appends the previous
    /// status here before swapping in a new one.
    #[serde(default)]
    pub status_history: Vec<Status>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, CustomFieldValue>,
    /// Optimistic-concurrency token owned by the store. Zero until first
    /// saved.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    /// Create a work item in `initial` state. The caller resolves the
    /// initial state from the work type's workflow variant.
    #[must_use]
    pub fn new(
        domain_id: &str,
        work_id: &str,
        work_type_id: &str,
        title: &str,
        initial: WorkflowState,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            domain_id: domain_id.to_string(),
            work_id: work_id.to_string(),
            parent_work_id: None,
            work_type_id: work_type_id.to_string(),
            title: title.to_string(),
            description: None,
            status: Status::new(initial, "", at),
            status_history: Vec::new(),
            custom_fields: BTreeMap::new(),
            version: 0,
            created_at: at,
            updated_at: at,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WorkflowState {
        self.status.state
    }

    /// Returns `true` once the item has reached the terminal state.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Supersede the current status with `next`.
    ///
    /// The previous status is appended to the history (oldest first) and
    /// `next` becomes current, in that order, with nothing fallible in
    /// between, so a caller never observes the half-applied item.
    pub(crate) fn commit_status(&mut self, next: Status) {
        self.updated_at = next.at;
        let previous = std::mem::replace(&mut self.status, next);
        self.status_history.push(previous);
    }

    /// Set or replace a custom-field value. Callers gate this behind the
    /// engine's `can_update` check and the field validator.
    pub fn set_field(&mut self, field_id: &str, value: CustomFieldValue, at: DateTime<Utc>) {
        self.custom_fields.insert(field_id.to_string(), value);
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::{Status, WorkItem};
    use crate::model::state::WorkflowState;
    use crate::model::value::CustomFieldValue;
    use chrono::{TimeZone, Utc};

    fn t(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn item() -> WorkItem {
        WorkItem::new(
            "accel",
            "wr-1",
            "hardware_report",
            "Replace klystron",
            WorkflowState::Submitted,
            t(100),
        )
    }

    #[test]
    fn new_item_has_empty_history() {
        let work = item();
        assert_eq!(work.state(), WorkflowState::Submitted);
        assert!(work.status_history.is_empty());
        assert!(!work.is_closed());
        assert_eq!(work.version, 0);
    }

    #[test]
    fn commit_status_appends_previous_then_swaps() {
        let mut work = item();
        work.commit_status(Status::new(WorkflowState::Approved, "lgtm", t(200)));

        assert_eq!(work.state(), WorkflowState::Approved);
        assert_eq!(work.status.comment, "lgtm");
        assert_eq!(work.status_history.len(), 1);
        assert_eq!(work.status_history[0].state, WorkflowState::Submitted);
        assert_eq!(work.updated_at, t(200));

        work.commit_status(Status::new(WorkflowState::InProgress, "", t(300)));
        assert_eq!(
            work.status_history
                .iter()
                .map(|s| s.state)
                .collect::<Vec<_>>(),
            vec![WorkflowState::Submitted, WorkflowState::Approved]
        );
    }

    #[test]
    fn closed_is_terminal() {
        let mut work = item();
        work.commit_status(Status::new(WorkflowState::Closed, "", t(200)));
        assert!(work.is_closed());
    }

    #[test]
    fn set_field_touches_updated_at() {
        let mut work = item();
        work.set_field("urgency", CustomFieldValue::Lov("high".into()), t(250));
        assert_eq!(work.updated_at, t(250));
        assert_eq!(
            work.custom_fields.get("urgency"),
            Some(&CustomFieldValue::Lov("high".into()))
        );
    }

    #[test]
    fn json_roundtrip() {
        let mut work = item();
        work.parent_work_id = Some("wr-0".into());
        work.set_field("count", CustomFieldValue::Number(3), t(150));

        let json = serde_json::to_string(&work).unwrap();
        let back: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, work);
    }
}
