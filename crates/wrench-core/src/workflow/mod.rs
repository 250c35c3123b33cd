//! Workflow variants: per-category state machines as pure data.
//!
//! Each work-type category (record, request, report) owns exactly one
//! [`WorkflowVariant`]: an immutable transition table plus the category's
//! predicates (automatic advance, child-creation eligibility). Tables are
//! checked once, when the variant is built, for the structural invariant
//! that every declared state reaches `Closed`, never per transition.
//!
//! The engine that applies transitions against these tables lives in
//! [`engine`]; the shipped tables live in [`variants`].

pub mod engine;
pub mod variants;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::{fmt, str::FromStr};

use crate::model::state::WorkflowState;

// ---------------------------------------------------------------------------
// VariantId
// ---------------------------------------------------------------------------

/// Closed set of workflow variant identifiers. Selection happens through
/// [`VariantSet`], built once at startup. No name-keyed registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantId {
    Record,
    Request,
    Report,
}

impl VariantId {
    pub const ALL: [Self; 3] = [Self::Record, Self::Request, Self::Report];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Request => "request",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(Self::Record),
            "request" => Ok(Self::Request),
            "report" => Ok(Self::Report),
            _ => Err(format!("unknown workflow variant: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural defects rejected when a variant table is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariantError {
    /// A declared non-terminal state has no path to `Closed`.
    #[error("variant {variant}: state {state} has no path to closed")]
    DeadEnd {
        variant: VariantId,
        state: WorkflowState,
    },

    /// The terminal state declares outgoing edges.
    #[error("variant {variant}: closed must not have outgoing transitions")]
    TerminalHasEdges { variant: VariantId },

    /// An edge targets a state the table never declares.
    #[error("variant {variant}: edge {from} -> {to} targets an undeclared state")]
    UndeclaredTarget {
        variant: VariantId,
        from: WorkflowState,
        to: WorkflowState,
    },

    /// The initial state is not declared in the table.
    #[error("variant {variant}: initial state {initial} is not declared")]
    UndeclaredInitial {
        variant: VariantId,
        initial: WorkflowState,
    },
}

// ---------------------------------------------------------------------------
// WorkflowVariant
// ---------------------------------------------------------------------------

/// One category's state machine: initial state, transition table, and
/// predicates. Immutable after construction.
#[derive(Debug, Clone)]
pub struct WorkflowVariant {
    id: VariantId,
    initial: WorkflowState,
    table: BTreeMap<WorkflowState, BTreeSet<WorkflowState>>,
}

impl WorkflowVariant {
    /// Build a variant from `(state, allowed next states)` edges, verifying
    /// the table's structural invariants once.
    ///
    /// # Errors
    ///
    /// Returns [`VariantError`] when `Closed` has outgoing edges, an edge
    /// targets an undeclared state, the initial state is undeclared, or a
    /// declared state cannot reach `Closed`.
    pub fn from_edges(
        id: VariantId,
        initial: WorkflowState,
        edges: &[(WorkflowState, &[WorkflowState])],
    ) -> Result<Self, VariantError> {
        let mut table: BTreeMap<WorkflowState, BTreeSet<WorkflowState>> = BTreeMap::new();
        for (from, targets) in edges {
            table
                .entry(*from)
                .or_default()
                .extend(targets.iter().copied());
        }
        // Closed participates in every table, outgoing-edge-free.
        table.entry(WorkflowState::Closed).or_default();

        let variant = Self { id, initial, table };
        variant.check()?;
        Ok(variant)
    }

    fn check(&self) -> Result<(), VariantError> {
        if !self
            .table
            .get(&WorkflowState::Closed)
            .is_some_and(BTreeSet::is_empty)
        {
            return Err(VariantError::TerminalHasEdges { variant: self.id });
        }
        if !self.table.contains_key(&self.initial) {
            return Err(VariantError::UndeclaredInitial {
                variant: self.id,
                initial: self.initial,
            });
        }
        for (from, targets) in &self.table {
            for to in targets {
                if !self.table.contains_key(to) {
                    return Err(VariantError::UndeclaredTarget {
                        variant: self.id,
                        from: *from,
                        to: *to,
                    });
                }
            }
        }
        for state in self.table.keys() {
            if !self.reaches_closed(*state) {
                return Err(VariantError::DeadEnd {
                    variant: self.id,
                    state: *state,
                });
            }
        }
        Ok(())
    }

    /// BFS from `start` over the table, looking for `Closed`.
    fn reaches_closed(&self, start: WorkflowState) -> bool {
        let mut visited: HashSet<WorkflowState> = HashSet::new();
        let mut queue: VecDeque<WorkflowState> = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if current == WorkflowState::Closed {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(targets) = self.table.get(&current) {
                queue.extend(targets.iter().copied());
            }
        }
        false
    }

    #[must_use]
    pub const fn id(&self) -> VariantId {
        self.id
    }

    /// The state new work items of this variant start in.
    #[must_use]
    pub const fn initial(&self) -> WorkflowState {
        self.initial
    }

    /// All states the table declares.
    pub fn states(&self) -> impl Iterator<Item = WorkflowState> + '_ {
        self.table.keys().copied()
    }

    /// Whether `from -> to` is a legal one-step transition.
    #[must_use]
    pub fn permits(&self, from: WorkflowState, to: WorkflowState) -> bool {
        self.table.get(&from).is_some_and(|set| set.contains(&to))
    }

    /// The outgoing edges of `from`. Empty for `Closed` and for states this
    /// variant never declares.
    #[must_use]
    pub fn next_states(&self, from: WorkflowState) -> BTreeSet<WorkflowState> {
        self.table.get(&from).cloned().unwrap_or_default()
    }

    /// Automatic-transition predicate, re-evaluated after a child's status
    /// change. `children` is the current state of every direct child.
    ///
    /// Request and report parents advance to `ReviewToClose` once every
    /// child is closed; records never advance automatically.
    #[must_use]
    pub fn auto_advance(
        &self,
        current: WorkflowState,
        children: &[WorkflowState],
    ) -> Option<WorkflowState> {
        match self.id {
            VariantId::Record => None,
            VariantId::Request | VariantId::Report => {
                let all_closed =
                    !children.is_empty() && children.iter().all(|s| s.is_terminal());
                let eligible = matches!(
                    current,
                    WorkflowState::InProgress | WorkflowState::WorkComplete
                );
                (all_closed && eligible && self.permits(current, WorkflowState::ReviewToClose))
                    .then_some(WorkflowState::ReviewToClose)
            }
        }
    }

    /// Child-creation eligibility for a parent in `state`. Every variant
    /// denies children once the parent is closed; requests and reports also
    /// deny them during close-out review.
    #[must_use]
    pub fn can_create_child(&self, state: WorkflowState) -> bool {
        if state.is_terminal() {
            return false;
        }
        match self.id {
            VariantId::Record => true,
            VariantId::Request | VariantId::Report => state != WorkflowState::ReviewToClose,
        }
    }
}

// ---------------------------------------------------------------------------
// VariantSet
// ---------------------------------------------------------------------------

/// The startup-built lookup table from [`VariantId`] to its variant.
#[derive(Debug, Clone)]
pub struct VariantSet {
    variants: BTreeMap<VariantId, WorkflowVariant>,
}

impl VariantSet {
    /// Build the set of shipped variants, running each table's structural
    /// check.
    ///
    /// # Errors
    ///
    /// Returns [`VariantError`] if any shipped table is malformed: a
    /// programming error surfaced at startup rather than mid-transition.
    pub fn builtin() -> Result<Self, VariantError> {
        let mut set = BTreeMap::new();
        for variant in [
            variants::record()?,
            variants::request()?,
            variants::report()?,
        ] {
            set.insert(variant.id(), variant);
        }
        Ok(Self { variants: set })
    }

    /// Look up a variant by id. Infallible for the builtin set, which
    /// covers every [`VariantId`].
    #[must_use]
    pub fn get(&self, id: VariantId) -> Option<&WorkflowVariant> {
        self.variants.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::{VariantError, VariantId, VariantSet, WorkflowVariant};
    use crate::model::state::WorkflowState::{
        Approved, Closed, InProgress, Submitted, WorkComplete,
    };

    #[test]
    fn builtin_set_passes_structural_checks() {
        let set = VariantSet::builtin().unwrap();
        for id in VariantId::ALL {
            let variant = set.get(id).expect("builtin variant");
            assert_eq!(variant.initial(), Submitted);
            assert!(variant.next_states(Closed).is_empty());
        }
    }

    #[test]
    fn dead_end_state_is_rejected() {
        // Approved has no outgoing edges and is not Closed.
        let err = WorkflowVariant::from_edges(
            VariantId::Record,
            Submitted,
            &[(Submitted, &[Approved, Closed]), (Approved, &[])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            VariantError::DeadEnd {
                variant: VariantId::Record,
                state: Approved
            }
        );
    }

    #[test]
    fn terminal_with_edges_is_rejected() {
        let err = WorkflowVariant::from_edges(
            VariantId::Record,
            Submitted,
            &[(Submitted, &[Closed]), (Closed, &[Submitted])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            VariantError::TerminalHasEdges {
                variant: VariantId::Record
            }
        );
    }

    #[test]
    fn undeclared_target_is_rejected() {
        let err = WorkflowVariant::from_edges(
            VariantId::Record,
            Submitted,
            &[(Submitted, &[Approved])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            VariantError::UndeclaredTarget {
                variant: VariantId::Record,
                from: Submitted,
                to: Approved
            }
        );
    }

    #[test]
    fn undeclared_initial_is_rejected() {
        let err =
            WorkflowVariant::from_edges(VariantId::Record, Approved, &[(Submitted, &[Closed])])
                .unwrap_err();
        assert_eq!(
            err,
            VariantError::UndeclaredInitial {
                variant: VariantId::Record,
                initial: Approved
            }
        );
    }

    #[test]
    fn permits_follows_the_table() {
        let set = VariantSet::builtin().unwrap();
        let record = set.get(VariantId::Record).unwrap();
        assert!(record.permits(Submitted, Approved));
        assert!(record.permits(InProgress, Closed));
        assert!(!record.permits(Approved, Closed));
        assert!(!record.permits(Closed, Submitted));
    }

    #[test]
    fn auto_advance_requires_children_all_closed() {
        let set = VariantSet::builtin().unwrap();
        let request = set.get(VariantId::Request).unwrap();

        assert_eq!(
            request.auto_advance(InProgress, &[Closed, Closed]),
            Some(crate::model::state::WorkflowState::ReviewToClose)
        );
        assert_eq!(
            request.auto_advance(WorkComplete, &[Closed]),
            Some(crate::model::state::WorkflowState::ReviewToClose)
        );
        // Open child blocks the advance.
        assert_eq!(request.auto_advance(InProgress, &[Closed, InProgress]), None);
        // No children at all: nothing to roll up.
        assert_eq!(request.auto_advance(InProgress, &[]), None);
        // Already past the eligible window.
        assert_eq!(
            request.auto_advance(crate::model::state::WorkflowState::ReviewToClose, &[Closed]),
            None
        );

        let record = set.get(VariantId::Record).unwrap();
        assert_eq!(record.auto_advance(InProgress, &[Closed]), None);
    }

    #[test]
    fn child_creation_denied_once_closed() {
        let set = VariantSet::builtin().unwrap();
        for id in VariantId::ALL {
            assert!(!set.get(id).unwrap().can_create_child(Closed));
        }
        let report = set.get(VariantId::Report).unwrap();
        assert!(report.can_create_child(InProgress));
        assert!(!report.can_create_child(crate::model::state::WorkflowState::ReviewToClose));
        let record = set.get(VariantId::Record).unwrap();
        assert!(record.can_create_child(Submitted));
    }
}
