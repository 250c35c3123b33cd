use std::fmt;

use crate::event::ProcessError;
use crate::propagate::PropagationError;
use crate::repo::SaveError;
use crate::workflow::engine::EngineError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    WorkNotFound,
    IllegalTransition,
    NoTargetState,
    WorkCompleted,
    WorkTypeNotFound,
    ParentNotFound,
    FieldValidationFailed,
    LovCatalogNotFound,
    VersionConflict,
    StoreFailed,
    PropagationDeadLettered,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::WorkNotFound => "E2001",
            Self::IllegalTransition => "E2002",
            Self::NoTargetState => "E2003",
            Self::WorkCompleted => "E2004",
            Self::WorkTypeNotFound => "E2005",
            Self::ParentNotFound => "E2006",
            Self::FieldValidationFailed => "E3001",
            Self::LovCatalogNotFound => "E3002",
            Self::VersionConflict => "E4001",
            Self::StoreFailed => "E5001",
            Self::PropagationDeadLettered => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::WorkNotFound => "Work item not found",
            Self::IllegalTransition => "Illegal status transition",
            Self::NoTargetState => "No target state requested",
            Self::WorkCompleted => "Work item is closed",
            Self::WorkTypeNotFound => "Work type not found",
            Self::ParentNotFound => "Parent work item not found",
            Self::FieldValidationFailed => "Custom field validation failed",
            Self::LovCatalogNotFound => "LOV catalog not found",
            Self::VersionConflict => "Concurrent update conflict",
            Self::StoreFailed => "Store operation failed",
            Self::PropagationDeadLettered => "Propagation dead-lettered",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `wr init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .wrench/config.toml and retry."),
            Self::WorkNotFound | Self::ParentNotFound => None,
            Self::IllegalTransition => {
                Some("Run `wr show <id>` to see the permitted next statuses.")
            }
            Self::NoTargetState => Some("Pass a target status with --to."),
            Self::WorkCompleted => Some("Closed items accept no further updates."),
            Self::WorkTypeNotFound => Some("Run `wr types` to list registered work types."),
            Self::FieldValidationFailed => {
                Some("Fix every reported field violation and resubmit.")
            }
            Self::LovCatalogNotFound => Some("Run `wr lov` to list known catalogs."),
            Self::VersionConflict => Some("Reload the item and retry the update."),
            Self::StoreFailed => Some("Check disk space and permissions on .wrench/."),
            Self::PropagationDeadLettered => {
                Some("Replay the preserved event once the store recovers.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::NoTargetState => Self::NoTargetState,
            EngineError::IllegalTransition { .. } => Self::IllegalTransition,
            EngineError::WorkCompleted { .. } => Self::WorkCompleted,
            EngineError::WorkTypeNotFound { .. } => Self::WorkTypeNotFound,
            EngineError::VariantNotRegistered { .. } | EngineError::TypeLookup(_) => {
                Self::InternalUnexpected
            }
        }
    }
}

impl From<&SaveError> for ErrorCode {
    fn from(err: &SaveError) -> Self {
        match err {
            SaveError::Conflict { .. } => Self::VersionConflict,
            SaveError::Other(_) => Self::StoreFailed,
        }
    }
}

impl From<&PropagationError> for ErrorCode {
    fn from(err: &PropagationError) -> Self {
        match err {
            PropagationError::ParentNotFound { .. } => Self::ParentNotFound,
            PropagationError::Engine(e) => Self::from(e),
            PropagationError::Save(e) => Self::from(e),
            PropagationError::Repo(_) => Self::StoreFailed,
        }
    }
}

impl From<&ProcessError> for ErrorCode {
    fn from(err: &ProcessError) -> Self {
        match err {
            ProcessError::WorkNotFound { .. } => Self::WorkNotFound,
            ProcessError::Engine(e) => Self::from(e),
            ProcessError::Save(e) => Self::from(e),
            ProcessError::Repo(_) => Self::StoreFailed,
            ProcessError::Propagation(e) => Self::from(e),
            ProcessError::DeadLettered(_) => Self::PropagationDeadLettered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use crate::model::state::WorkflowState;
    use crate::workflow::engine::EngineError;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 14] = [
        ErrorCode::NotInitialized,
        ErrorCode::ConfigParseError,
        ErrorCode::WorkNotFound,
        ErrorCode::IllegalTransition,
        ErrorCode::NoTargetState,
        ErrorCode::WorkCompleted,
        ErrorCode::WorkTypeNotFound,
        ErrorCode::ParentNotFound,
        ErrorCode::FieldValidationFailed,
        ErrorCode::LovCatalogNotFound,
        ErrorCode::VersionConflict,
        ErrorCode::StoreFailed,
        ErrorCode::PropagationDeadLettered,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let rendered = code.code();
            assert_eq!(rendered.len(), 5);
            assert!(rendered.starts_with('E'));
            assert!(rendered.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn engine_errors_map_to_codes() {
        let err = EngineError::IllegalTransition {
            from: WorkflowState::Approved,
            to: WorkflowState::Closed,
        };
        assert_eq!(ErrorCode::from(&err), ErrorCode::IllegalTransition);
        assert_eq!(
            ErrorCode::from(&EngineError::NoTargetState),
            ErrorCode::NoTargetState
        );
    }
}
