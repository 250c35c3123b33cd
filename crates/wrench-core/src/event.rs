//! Inbound status-change events and their processor.
//!
//! One event per work-item update. The processor applies the explicit
//! transition (when the event carries a target state), saves the item, then
//! walks the parent chain, one [`Propagator`] invocation per level, with a
//! depth guard instead of unbounded recursion. Parent load/save failures
//! retry on the configured [`RetryPolicy`] and dead-letter after the
//! ceiling, preserving the originating event for manual replay.
//!
//! Replay safety: an event whose target equals the item's current state is
//! reported as [`TransitionOutcome::AlreadyApplied`], a no-op success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::model::state::WorkflowState;
use crate::model::work::WorkItem;
use crate::propagate::{PropagationError, PropagationOutcome, Propagator};
use crate::repo::{SaveError, WorkRepository, WorkTypes};
use crate::retry::RetryPolicy;
use crate::workflow::engine::{EngineError, WorkflowEngine};

/// Levels the processor will walk up a hierarchy in one invocation.
pub const DEFAULT_MAX_DEPTH: u32 = 32;

// ---------------------------------------------------------------------------
// Event shape
// ---------------------------------------------------------------------------

/// The inbound event consumed by the processor.
///
/// An absent `target_state` means "re-evaluate automatic rules only, no
/// explicit user transition requested".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    pub domain_id: String,
    pub work_id: String,
    #[serde(default)]
    pub target_state: Option<WorkflowState>,
    #[serde(default)]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Outcomes and errors
// ---------------------------------------------------------------------------

/// What happened to the event's explicit transition, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition applied and the item was saved.
    Applied(WorkflowState),
    /// The item was already in the target state (a replayed event).
    AlreadyApplied(WorkflowState),
    /// The event carried no target; only automatic rules were evaluated.
    Reevaluated,
}

/// Full account of one processed event.
#[derive(Debug)]
pub struct ProcessReport {
    pub transition: TransitionOutcome,
    /// One entry per hierarchy level walked, in child-to-ancestor order.
    pub propagations: Vec<PropagationOutcome>,
}

/// A propagation failure that exhausted its retry budget. The originating
/// event is preserved for manual replay.
#[derive(Debug)]
pub struct DeadLetter {
    pub event: StatusChangeEvent,
    pub attempts: u32,
    pub reason: String,
}

impl fmt::Display for DeadLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event for {}/{} dead-lettered after {} attempt(s): {}",
            self.event.domain_id, self.event.work_id, self.attempts, self.reason
        )
    }
}

/// Failure modes of event processing.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("work {domain_id}/{work_id} not found")]
    WorkNotFound { domain_id: String, work_id: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to save work: {0}")]
    Save(#[from] SaveError),

    #[error("repository failure: {0}")]
    Repo(#[from] anyhow::Error),

    /// The referenced parent does not exist. A data defect, not retried.
    #[error(transparent)]
    Propagation(PropagationError),

    #[error("{0}")]
    DeadLettered(DeadLetter),
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Drives transition events through the engine and the propagator.
pub struct EventProcessor<'a, R: WorkRepository, T: WorkTypes> {
    engine: &'a WorkflowEngine<T>,
    repo: &'a R,
    retry: RetryPolicy,
    max_depth: u32,
}

impl<'a, R: WorkRepository, T: WorkTypes> EventProcessor<'a, R, T> {
    #[must_use]
    pub fn new(engine: &'a WorkflowEngine<T>, repo: &'a R, retry: RetryPolicy) -> Self {
        Self {
            engine,
            repo,
            retry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the hierarchy depth guard.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Process one event: explicit transition (if requested), then the
    /// upward propagation walk.
    ///
    /// # Errors
    ///
    /// [`ProcessError::WorkNotFound`] for an unknown item; engine and save
    /// failures from the explicit transition; [`ProcessError::DeadLettered`]
    /// when propagation exhausts its retry budget.
    pub fn process(
        &self,
        event: &StatusChangeEvent,
        at: DateTime<Utc>,
    ) -> Result<ProcessReport, ProcessError> {
        let mut work = self
            .repo
            .find_by_domain_and_id(&event.domain_id, &event.work_id)?
            .ok_or_else(|| ProcessError::WorkNotFound {
                domain_id: event.domain_id.clone(),
                work_id: event.work_id.clone(),
            })?;

        let transition = match event.target_state {
            Some(target) if work.state() == target => {
                // Replay observing the post-transition state.
                TransitionOutcome::AlreadyApplied(target)
            }
            Some(target) => {
                let comment = event.comment.as_deref().unwrap_or_default();
                self.engine
                    .request_transition(&mut work, Some(target), comment, at)?;
                self.repo.save(&mut work)?;
                TransitionOutcome::Applied(target)
            }
            None => TransitionOutcome::Reevaluated,
        };

        let propagations = self.walk_upward(event, &work, at)?;
        Ok(ProcessReport {
            transition,
            propagations,
        })
    }

    /// Walk the parent chain, one propagation per level, until a level
    /// does not advance or the depth guard trips.
    fn walk_upward(
        &self,
        event: &StatusChangeEvent,
        start: &WorkItem,
        at: DateTime<Utc>,
    ) -> Result<Vec<PropagationOutcome>, ProcessError> {
        let propagator = Propagator::new(self.engine, self.repo);
        let mut outcomes = Vec::new();
        let mut current = start.clone();

        for depth in 0..self.max_depth {
            let outcome = self.propagate_with_retry(event, &propagator, &current, at)?;
            let advanced_to = match &outcome {
                PropagationOutcome::Advanced { parent_work_id, .. } => {
                    Some(parent_work_id.clone())
                }
                PropagationOutcome::NoParent | PropagationOutcome::NotEligible => None,
            };
            outcomes.push(outcome);

            let Some(parent_work_id) = advanced_to else {
                break;
            };
            let Some(parent) = self
                .repo
                .find_by_domain_and_id(&current.domain_id, &parent_work_id)?
            else {
                break; // parent vanished between save and reload
            };
            current = parent;

            if depth + 1 == self.max_depth {
                warn!(
                    domain_id = %event.domain_id,
                    work_id = %event.work_id,
                    max_depth = self.max_depth,
                    "propagation depth guard reached; remaining ancestors untouched"
                );
            }
        }
        Ok(outcomes)
    }

    /// One propagation level, retried on infrastructure failures.
    fn propagate_with_retry(
        &self,
        event: &StatusChangeEvent,
        propagator: &Propagator<'_, R, T>,
        child: &WorkItem,
        at: DateTime<Utc>,
    ) -> Result<PropagationOutcome, ProcessError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match propagator.propagate_upward(child, at) {
                Ok(outcome) => return Ok(outcome),
                Err(err) if is_retryable(&err) => {
                    if self.retry.allows_retry(attempts) {
                        let delay = self.retry.delay_for_attempt(attempts);
                        warn!(
                            domain_id = %event.domain_id,
                            work_id = %event.work_id,
                            attempt = attempts,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "propagation failed, retrying"
                        );
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                    } else {
                        return Err(ProcessError::DeadLettered(DeadLetter {
                            event: event.clone(),
                            attempts,
                            reason: err.to_string(),
                        }));
                    }
                }
                Err(err) => return Err(ProcessError::Propagation(err)),
            }
        }
    }
}

/// Parent load/save failures retry; everything else is terminal.
const fn is_retryable(err: &PropagationError) -> bool {
    matches!(
        err,
        PropagationError::Repo(_) | PropagationError::Save(_)
    )
}
