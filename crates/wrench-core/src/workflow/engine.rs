//! The workflow engine: applies transition requests against a work item's
//! variant and mutates status + history.
//!
//! The engine is pure with respect to shared state. Its only collaborator
//! is the [`WorkTypes`] lookup used to resolve a work item's governing
//! variant; persistence belongs to the caller. A transition either fully
//! applies (history append + status swap) or leaves the item untouched:
//! all checks run before the first mutation.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::debug;

use crate::model::state::WorkflowState;
use crate::model::work::{Status, WorkItem};
use crate::model::work_type::WorkType;
use crate::repo::WorkTypes;
use crate::workflow::{VariantId, VariantSet, WorkflowVariant};

/// Failure modes of engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No target state was supplied with the transition request.
    #[error("no target state requested")]
    NoTargetState,

    /// The variant's table has no `from -> to` edge.
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        from: WorkflowState,
        to: WorkflowState,
    },

    /// Mutation attempted on a closed work item.
    #[error("work {domain_id}/{work_id} is closed and accepts no further updates")]
    WorkCompleted { domain_id: String, work_id: String },

    /// The work item references a work type the registry does not know.
    #[error("work type not found: '{work_type_id}'")]
    WorkTypeNotFound { work_type_id: String },

    /// A work type references a variant id missing from the engine's set.
    #[error("workflow variant not registered: {variant}")]
    VariantNotRegistered { variant: VariantId },

    /// Work-type lookup infrastructure failure.
    #[error("work type lookup failed: {0}")]
    TypeLookup(#[from] anyhow::Error),
}

/// Applies transitions for work items, resolving each item's variant
/// through the work-type registry it was built with.
pub struct WorkflowEngine<T: WorkTypes> {
    variants: VariantSet,
    types: T,
}

impl<T: WorkTypes> WorkflowEngine<T> {
    #[must_use]
    pub fn new(variants: VariantSet, types: T) -> Self {
        Self { variants, types }
    }

    /// Resolve the variant governing `work` via its work type.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkTypeNotFound`] for an unknown type id and
    /// [`EngineError::VariantNotRegistered`] for a type whose variant is
    /// missing from this engine's set.
    pub fn variant_for(&self, work: &WorkItem) -> Result<&WorkflowVariant, EngineError> {
        let work_type =
            self.types
                .find(&work.work_type_id)?
                .ok_or_else(|| EngineError::WorkTypeNotFound {
                    work_type_id: work.work_type_id.clone(),
                })?;
        self.variant_of(&work_type)
    }

    /// The variant a work type selects.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VariantNotRegistered`] when the variant id is
    /// absent from this engine's set.
    pub fn variant_of(&self, work_type: &WorkType) -> Result<&WorkflowVariant, EngineError> {
        self.variants
            .get(work_type.variant)
            .ok_or(EngineError::VariantNotRegistered {
                variant: work_type.variant,
            })
    }

    /// Apply a transition request to `work`.
    ///
    /// On success the previous status is appended to the history and the
    /// new status `{target, comment, at}` becomes current, both or
    /// neither; every check runs before the first mutation.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoTargetState`] when `target` is `None`,
    /// [`EngineError::WorkCompleted`] when the item is closed,
    /// [`EngineError::IllegalTransition`] when the variant's table has no
    /// edge from the current state to `target`, plus variant-resolution
    /// failures from [`Self::variant_for`].
    pub fn request_transition(
        &self,
        work: &mut WorkItem,
        target: Option<WorkflowState>,
        comment: &str,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let Some(target) = target else {
            return Err(EngineError::NoTargetState);
        };
        self.can_update(work)?;

        let variant = self.variant_for(work)?;
        let from = work.state();
        if !variant.permits(from, target) {
            return Err(EngineError::IllegalTransition { from, to: target });
        }

        work.commit_status(Status::new(target, comment, at));
        debug!(
            domain_id = %work.domain_id,
            work_id = %work.work_id,
            %from,
            to = %target,
            "applied transition"
        );
        Ok(())
    }

    /// Whether any mutation (field or status) is still permitted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkCompleted`] once the item is closed.
    pub fn can_update(&self, work: &WorkItem) -> Result<(), EngineError> {
        if work.is_closed() {
            return Err(EngineError::WorkCompleted {
                domain_id: work.domain_id.clone(),
                work_id: work.work_id.clone(),
            });
        }
        Ok(())
    }

    /// True iff the item reached the terminal state. All variants agree.
    #[must_use]
    pub fn is_completed(&self, work: &WorkItem) -> bool {
        work.is_closed()
    }

    /// The states reachable in one step from the item's current state.
    /// Empty for closed items.
    ///
    /// # Errors
    ///
    /// Variant-resolution failures from [`Self::variant_for`].
    pub fn permitted_statuses(
        &self,
        work: &WorkItem,
    ) -> Result<BTreeSet<WorkflowState>, EngineError> {
        Ok(self.variant_for(work)?.next_states(work.state()))
    }

    /// Variant-specific child-creation predicate.
    ///
    /// # Errors
    ///
    /// Variant-resolution failures from [`Self::variant_for`].
    pub fn can_create_child(&self, work: &WorkItem) -> Result<bool, EngineError> {
        Ok(self.variant_for(work)?.can_create_child(work.state()))
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineError, WorkflowEngine};
    use crate::model::state::WorkflowState;
    use crate::model::work::WorkItem;
    use crate::model::work_type::WorkType;
    use crate::repo::MemoryWorkTypes;
    use crate::workflow::{VariantId, VariantSet};
    use chrono::{TimeZone, Utc};

    fn t(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn engine() -> WorkflowEngine<MemoryWorkTypes> {
        let mut types = MemoryWorkTypes::new();
        types.insert(WorkType::new("record", "Record", VariantId::Record, vec![]).unwrap());
        types.insert(WorkType::new("request", "Request", VariantId::Request, vec![]).unwrap());
        WorkflowEngine::new(VariantSet::builtin().unwrap(), types)
    }

    fn record_item() -> WorkItem {
        WorkItem::new("accel", "wr-1", "record", "Log a fault", WorkflowState::Submitted, t(0))
    }

    #[test]
    fn record_lifecycle_with_history() {
        let engine = engine();
        let mut work = record_item();

        engine
            .request_transition(&mut work, Some(WorkflowState::Approved), "ok", t(10))
            .unwrap();
        assert_eq!(work.state(), WorkflowState::Approved);
        assert_eq!(
            work.status_history.iter().map(|s| s.state).collect::<Vec<_>>(),
            vec![WorkflowState::Submitted]
        );

        engine
            .request_transition(&mut work, Some(WorkflowState::InProgress), "", t(20))
            .unwrap();
        assert_eq!(
            work.status_history.iter().map(|s| s.state).collect::<Vec<_>>(),
            vec![WorkflowState::Submitted, WorkflowState::Approved]
        );
    }

    #[test]
    fn skipping_a_step_is_illegal() {
        let engine = engine();
        let mut work = record_item();
        engine
            .request_transition(&mut work, Some(WorkflowState::Approved), "", t(10))
            .unwrap();

        let history_before = work.status_history.len();
        let err = engine
            .request_transition(&mut work, Some(WorkflowState::Closed), "", t(20))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::IllegalTransition {
                from: WorkflowState::Approved,
                to: WorkflowState::Closed
            }
        ));
        // Failed transition leaves the item untouched.
        assert_eq!(work.state(), WorkflowState::Approved);
        assert_eq!(work.status_history.len(), history_before);
    }

    #[test]
    fn replayed_transition_fails_without_double_history() {
        let engine = engine();
        let mut work = record_item();
        engine
            .request_transition(&mut work, Some(WorkflowState::Approved), "", t(10))
            .unwrap();
        let len = work.status_history.len();

        let err = engine
            .request_transition(&mut work, Some(WorkflowState::Approved), "", t(10))
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalTransition { .. }));
        assert_eq!(work.status_history.len(), len);
    }

    #[test]
    fn none_target_is_rejected() {
        let engine = engine();
        let mut work = record_item();
        assert!(matches!(
            engine.request_transition(&mut work, None, "", t(10)),
            Err(EngineError::NoTargetState)
        ));
    }

    #[test]
    fn closed_item_rejects_everything() {
        let engine = engine();
        let mut work = record_item();
        for target in [
            WorkflowState::Approved,
            WorkflowState::InProgress,
            WorkflowState::Closed,
        ] {
            engine
                .request_transition(&mut work, Some(target), "", t(10))
                .unwrap();
        }
        assert!(engine.is_completed(&work));

        assert!(matches!(
            engine.can_update(&work),
            Err(EngineError::WorkCompleted { .. })
        ));
        assert!(matches!(
            engine.request_transition(&mut work, Some(WorkflowState::Submitted), "", t(40)),
            Err(EngineError::WorkCompleted { .. })
        ));
        assert!(engine.permitted_statuses(&work).unwrap().is_empty());
        assert!(!engine.can_create_child(&work).unwrap());
    }

    #[test]
    fn permitted_statuses_mirror_the_table() {
        let engine = engine();
        let work = record_item();
        let permitted = engine.permitted_statuses(&work).unwrap();
        assert_eq!(permitted.len(), 1);
        assert!(permitted.contains(&WorkflowState::Approved));
    }

    #[test]
    fn unknown_work_type_is_reported() {
        let engine = engine();
        let mut work = record_item();
        work.work_type_id = "mystery".into();
        assert!(matches!(
            engine.permitted_statuses(&work),
            Err(EngineError::WorkTypeNotFound { .. })
        ));
    }
}
