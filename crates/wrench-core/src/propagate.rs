//! Upward hierarchy propagation.
//!
//! After a child's status changes, the propagator re-evaluates the parent's
//! automatic-transition predicate and, if eligible, advances the parent
//! exactly once. Propagation is **single-level per invocation**: walking
//! further up the chain is the event processor's job ([`crate::event`]),
//! which keeps each step independently retryable and bounds stack depth.
//!
//! The child is only ever read. The parent is the only item written.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::model::state::WorkflowState;
use crate::model::work::WorkItem;
use crate::repo::{SaveError, WorkRepository, WorkTypes};
use crate::workflow::engine::{EngineError, WorkflowEngine};

/// Comment stamped on automatically applied parent transitions.
pub const AUTO_ADVANCE_COMMENT: &str = "all child work closed";

/// Failure modes of one propagation step.
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    /// The child names a parent the repository cannot load.
    #[error("parent {parent_work_id} of domain {domain_id} not found")]
    ParentNotFound {
        domain_id: String,
        parent_work_id: String,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to save parent: {0}")]
    Save(#[from] SaveError),

    /// Parent or sibling load failure.
    #[error("repository failure during propagation: {0}")]
    Repo(#[from] anyhow::Error),
}

/// What one propagation step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagationOutcome {
    /// The child has no parent; nothing to do.
    NoParent,
    /// The parent's predicate did not fire (open children, wrong state, or
    /// a variant with no automatic advance).
    NotEligible,
    /// The parent advanced. Carries the parent id and its new state so the
    /// caller can continue up the chain.
    Advanced {
        parent_work_id: String,
        to: WorkflowState,
    },
}

/// Re-evaluates parents after child status changes.
pub struct Propagator<'a, R: WorkRepository, T: WorkTypes> {
    engine: &'a WorkflowEngine<T>,
    repo: &'a R,
}

impl<'a, R: WorkRepository, T: WorkTypes> Propagator<'a, R, T> {
    #[must_use]
    pub fn new(engine: &'a WorkflowEngine<T>, repo: &'a R) -> Self {
        Self { engine, repo }
    }

    /// Propagate one level upward from `child`.
    ///
    /// Loads the parent and its direct children, re-runs the parent
    /// variant's automatic predicate, and applies at most one transition
    /// to the parent before saving it. Idempotent: once the parent has
    /// advanced, the predicate no longer fires and the call is a no-op.
    ///
    /// # Errors
    ///
    /// [`PropagationError::ParentNotFound`] when the referenced parent is
    /// absent; engine, save, and repository failures otherwise.
    pub fn propagate_upward(
        &self,
        child: &WorkItem,
        at: DateTime<Utc>,
    ) -> Result<PropagationOutcome, PropagationError> {
        let Some(parent_work_id) = child.parent_work_id.as_deref() else {
            return Ok(PropagationOutcome::NoParent);
        };

        let mut parent = self
            .repo
            .find_by_domain_and_id(&child.domain_id, parent_work_id)?
            .ok_or_else(|| PropagationError::ParentNotFound {
                domain_id: child.domain_id.clone(),
                parent_work_id: parent_work_id.to_string(),
            })?;

        let children = self.repo.find_children(&child.domain_id, parent_work_id)?;
        let child_states: Vec<WorkflowState> = children.iter().map(WorkItem::state).collect();

        let variant = self.engine.variant_for(&parent)?;
        let Some(target) = variant.auto_advance(parent.state(), &child_states) else {
            return Ok(PropagationOutcome::NotEligible);
        };

        self.engine
            .request_transition(&mut parent, Some(target), AUTO_ADVANCE_COMMENT, at)?;
        self.repo.save(&mut parent)?;

        info!(
            domain_id = %parent.domain_id,
            parent_work_id = %parent.work_id,
            to = %target,
            "parent advanced by propagation"
        );
        Ok(PropagationOutcome::Advanced {
            parent_work_id: parent.work_id,
            to: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{PropagationError, PropagationOutcome, Propagator, AUTO_ADVANCE_COMMENT};
    use crate::model::state::WorkflowState;
    use crate::model::work::WorkItem;
    use crate::model::work_type::WorkType;
    use crate::repo::{MemoryRepository, MemoryWorkTypes, WorkRepository};
    use crate::workflow::engine::WorkflowEngine;
    use crate::workflow::{VariantId, VariantSet};
    use chrono::{TimeZone, Utc};

    fn t(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn engine() -> WorkflowEngine<MemoryWorkTypes> {
        let mut types = MemoryWorkTypes::new();
        types.insert(WorkType::new("request", "Request", VariantId::Request, vec![]).unwrap());
        types.insert(WorkType::new("record", "Record", VariantId::Record, vec![]).unwrap());
        WorkflowEngine::new(VariantSet::builtin().unwrap(), types)
    }

    fn item(id: &str, type_id: &str, state: WorkflowState) -> WorkItem {
        let mut work = WorkItem::new("accel", id, type_id, "work", WorkflowState::Submitted, t(0));
        work.status.state = state;
        work
    }

    fn child_of(id: &str, parent: &str, state: WorkflowState) -> WorkItem {
        let mut work = item(id, "request", state);
        work.parent_work_id = Some(parent.to_string());
        work
    }

    #[test]
    fn no_parent_is_a_noop_success() {
        let engine = engine();
        let repo = MemoryRepository::new();
        let propagator = Propagator::new(&engine, &repo);

        let orphan = item("wr-1", "request", WorkflowState::Closed);
        assert_eq!(
            propagator.propagate_upward(&orphan, t(10)).unwrap(),
            PropagationOutcome::NoParent
        );
    }

    #[test]
    fn missing_parent_is_reported() {
        let engine = engine();
        let repo = MemoryRepository::new();
        let propagator = Propagator::new(&engine, &repo);

        let child = child_of("wr-c", "wr-ghost", WorkflowState::Closed);
        let err = propagator.propagate_upward(&child, t(10)).unwrap_err();
        assert!(matches!(err, PropagationError::ParentNotFound { .. }));
    }

    #[test]
    fn parent_advances_once_then_second_call_is_noop() {
        // Scenario: parent InProgress, all children closed. First
        // propagation advances to ReviewToClose; a second invocation
        // re-evaluates to "already satisfied" and does nothing.
        let engine = engine();
        let repo = MemoryRepository::new();
        repo.seed(item("wr-p", "request", WorkflowState::InProgress));
        repo.seed(child_of("wr-c1", "wr-p", WorkflowState::Closed));
        repo.seed(child_of("wr-c2", "wr-p", WorkflowState::Closed));
        let propagator = Propagator::new(&engine, &repo);

        let child = repo
            .find_by_domain_and_id("accel", "wr-c1")
            .unwrap()
            .unwrap();
        let outcome = propagator.propagate_upward(&child, t(10)).unwrap();
        assert_eq!(
            outcome,
            PropagationOutcome::Advanced {
                parent_work_id: "wr-p".into(),
                to: WorkflowState::ReviewToClose,
            }
        );

        let parent = repo.find_by_domain_and_id("accel", "wr-p").unwrap().unwrap();
        assert_eq!(parent.state(), WorkflowState::ReviewToClose);
        assert_eq!(parent.status.comment, AUTO_ADVANCE_COMMENT);
        assert_eq!(parent.status_history.len(), 1);

        assert_eq!(
            propagator.propagate_upward(&child, t(20)).unwrap(),
            PropagationOutcome::NotEligible
        );
        let parent = repo.find_by_domain_and_id("accel", "wr-p").unwrap().unwrap();
        assert_eq!(parent.status_history.len(), 1); // advanced exactly once
    }

    #[test]
    fn open_sibling_blocks_the_advance() {
        let engine = engine();
        let repo = MemoryRepository::new();
        repo.seed(item("wr-p", "request", WorkflowState::InProgress));
        repo.seed(child_of("wr-c1", "wr-p", WorkflowState::Closed));
        repo.seed(child_of("wr-c2", "wr-p", WorkflowState::InProgress));
        let propagator = Propagator::new(&engine, &repo);

        let child = repo
            .find_by_domain_and_id("accel", "wr-c1")
            .unwrap()
            .unwrap();
        assert_eq!(
            propagator.propagate_upward(&child, t(10)).unwrap(),
            PropagationOutcome::NotEligible
        );
    }

    #[test]
    fn record_parents_never_auto_advance() {
        let engine = engine();
        let repo = MemoryRepository::new();
        repo.seed(item("wr-p", "record", WorkflowState::InProgress));
        repo.seed(child_of("wr-c1", "wr-p", WorkflowState::Closed));
        let propagator = Propagator::new(&engine, &repo);

        let child = repo
            .find_by_domain_and_id("accel", "wr-c1")
            .unwrap()
            .unwrap();
        assert_eq!(
            propagator.propagate_upward(&child, t(10)).unwrap(),
            PropagationOutcome::NotEligible
        );
    }

    #[test]
    fn propagation_never_mutates_the_child() {
        let engine = engine();
        let repo = MemoryRepository::new();
        repo.seed(item("wr-p", "request", WorkflowState::InProgress));
        repo.seed(child_of("wr-c1", "wr-p", WorkflowState::Closed));
        let propagator = Propagator::new(&engine, &repo);

        let before = repo
            .find_by_domain_and_id("accel", "wr-c1")
            .unwrap()
            .unwrap();
        propagator.propagate_upward(&before, t(10)).unwrap();
        let after = repo
            .find_by_domain_and_id("accel", "wr-c1")
            .unwrap()
            .unwrap();
        assert_eq!(before, after);
    }
}
