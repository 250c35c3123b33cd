//! Workflow lifecycle states.
//!
//! One closed enumeration shared by every workflow variant. Which states a
//! given work item can actually visit, and in what order, is decided by its
//! variant's transition table ([`crate::workflow`]), not here. `Closed` is
//! terminal in every variant.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A work item's lifecycle state.
///
/// "No transition requested" is expressed as `Option::None` at the API
/// boundary, never as an enum variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Created,
    Submitted,
    PendingAssignment,
    PendingPaperwork,
    PendingApproval,
    ReadyForWork,
    Approved,
    InProgress,
    WorkComplete,
    ReviewToClose,
    Closed,
}

impl WorkflowState {
    /// All states, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Created,
        Self::Submitted,
        Self::PendingAssignment,
        Self::PendingPaperwork,
        Self::PendingApproval,
        Self::ReadyForWork,
        Self::Approved,
        Self::InProgress,
        Self::WorkComplete,
        Self::ReviewToClose,
        Self::Closed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::PendingAssignment => "pending_assignment",
            Self::PendingPaperwork => "pending_paperwork",
            Self::PendingApproval => "pending_approval",
            Self::ReadyForWork => "ready_for_work",
            Self::Approved => "approved",
            Self::InProgress => "in_progress",
            Self::WorkComplete => "work_complete",
            Self::ReviewToClose => "review_to_close",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a state from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateError {
    pub got: String,
}

impl fmt::Display for ParseStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid workflow state: '{}'", self.got)
    }
}

impl std::error::Error for ParseStateError {}

impl FromStr for WorkflowState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "created" => Ok(Self::Created),
            "submitted" => Ok(Self::Submitted),
            "pending_assignment" => Ok(Self::PendingAssignment),
            "pending_paperwork" => Ok(Self::PendingPaperwork),
            "pending_approval" => Ok(Self::PendingApproval),
            "ready_for_work" => Ok(Self::ReadyForWork),
            "approved" => Ok(Self::Approved),
            "in_progress" => Ok(Self::InProgress),
            "work_complete" => Ok(Self::WorkComplete),
            "review_to_close" => Ok(Self::ReviewToClose),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseStateError { got: s.to_string() }),
        }
    }
}
