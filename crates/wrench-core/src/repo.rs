//! Collaborator traits consumed by the core, plus in-memory reference
//! implementations.
//!
//! The engine, validator, and propagator never own storage or policy: they
//! are handed these traits by the caller. The SQLite store in [`crate::db`]
//! implements all of them; the in-memory types here back tests and embedders
//! that bring their own persistence.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use crate::model::work::WorkItem;
use crate::model::work_type::WorkType;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Load/save of work items, keyed by domain + work id.
///
/// `save` owns optimistic concurrency: implementations compare the item's
/// `version` against the stored row and fail [`SaveError::Conflict`] on a
/// stale write, bumping the version on success.
pub trait WorkRepository {
    /// # Errors
    /// Returns an error only for infrastructure failures; an absent item is
    /// `Ok(None)`.
    fn find_by_domain_and_id(&self, domain_id: &str, work_id: &str) -> Result<Option<WorkItem>>;

    /// Direct children of `parent_work_id` within a domain.
    ///
    /// # Errors
    /// Returns an error for infrastructure failures.
    fn find_children(&self, domain_id: &str, parent_work_id: &str) -> Result<Vec<WorkItem>>;

    /// Persist `work`, enforcing the version compare-and-swap. On success
    /// the item's `version` is bumped in place.
    ///
    /// # Errors
    /// Returns [`SaveError::Conflict`] on a stale version, otherwise wraps
    /// the infrastructure failure.
    fn save(&self, work: &mut WorkItem) -> Result<(), SaveError>;
}

/// Failure modes of [`WorkRepository::save`].
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Another writer saved the item since it was loaded.
    #[error("version conflict on {domain_id}/{work_id}: expected {expected}, found {found}")]
    Conflict {
        domain_id: String,
        work_id: String,
        expected: u64,
        found: u64,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Membership queries against externally managed List-Of-Values catalogs.
/// Consulted, never owned, by the validator.
pub trait LovCatalog {
    /// Does `member_id` belong to the catalog named by `catalog_ref`?
    ///
    /// # Errors
    /// Returns an error for infrastructure failures; an unknown catalog is
    /// simply `Ok(false)`.
    fn contains(&self, member_id: &str, catalog_ref: &str) -> Result<bool>;
}

/// Work-type lookup, used by the engine to resolve the governing variant.
pub trait WorkTypes {
    /// # Errors
    /// Returns an error for infrastructure failures; an unknown type is
    /// `Ok(None)`.
    fn find(&self, work_type_id: &str) -> Result<Option<WorkType>>;
}

/// Yes/no capability check consulted by the surrounding layer before the
/// engine is reached. The core itself performs no authorization.
pub trait AuthorizationGate {
    fn allowed(&self, actor: &str, action: &str, resource: &str) -> bool;
}

/// Gate that allows everything. Single-operator deployments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationGate for AllowAll {
    fn allowed(&self, _actor: &str, _action: &str, _resource: &str) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// In-memory [`WorkRepository`] with the same version CAS semantics as the
/// SQLite store.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    items: RefCell<BTreeMap<(String, String), WorkItem>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert without CAS, for test setup.
    pub fn seed(&self, mut work: WorkItem) {
        work.version += 1;
        self.items
            .borrow_mut()
            .insert((work.domain_id.clone(), work.work_id.clone()), work);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl WorkRepository for MemoryRepository {
    fn find_by_domain_and_id(&self, domain_id: &str, work_id: &str) -> Result<Option<WorkItem>> {
        Ok(self
            .items
            .borrow()
            .get(&(domain_id.to_string(), work_id.to_string()))
            .cloned())
    }

    fn find_children(&self, domain_id: &str, parent_work_id: &str) -> Result<Vec<WorkItem>> {
        Ok(self
            .items
            .borrow()
            .values()
            .filter(|w| {
                w.domain_id == domain_id && w.parent_work_id.as_deref() == Some(parent_work_id)
            })
            .cloned()
            .collect())
    }

    fn save(&self, work: &mut WorkItem) -> Result<(), SaveError> {
        let key = (work.domain_id.clone(), work.work_id.clone());
        let mut items = self.items.borrow_mut();
        if let Some(existing) = items.get(&key) {
            if existing.version != work.version {
                return Err(SaveError::Conflict {
                    domain_id: work.domain_id.clone(),
                    work_id: work.work_id.clone(),
                    expected: work.version,
                    found: existing.version,
                });
            }
        }
        work.version += 1;
        items.insert(key, work.clone());
        Ok(())
    }
}

/// In-memory LOV catalogs: a set of `(catalog_ref, member_id)` pairs.
#[derive(Debug, Default)]
pub struct MemoryLovCatalog {
    members: BTreeSet<(String, String)>,
}

impl MemoryLovCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, catalog_ref: &str, member_id: &str) {
        self.members
            .insert((catalog_ref.to_string(), member_id.to_string()));
    }
}

impl LovCatalog for MemoryLovCatalog {
    fn contains(&self, member_id: &str, catalog_ref: &str) -> Result<bool> {
        Ok(self
            .members
            .contains(&(catalog_ref.to_string(), member_id.to_string())))
    }
}

/// In-memory work-type registry.
#[derive(Debug, Default)]
pub struct MemoryWorkTypes {
    types: BTreeMap<String, WorkType>,
}

impl MemoryWorkTypes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, work_type: WorkType) {
        self.types.insert(work_type.id.clone(), work_type);
    }
}

impl WorkTypes for MemoryWorkTypes {
    fn find(&self, work_type_id: &str) -> Result<Option<WorkType>> {
        Ok(self.types.get(work_type_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AllowAll, AuthorizationGate, LovCatalog, MemoryLovCatalog, MemoryRepository, SaveError,
        WorkRepository,
    };
    use crate::model::state::WorkflowState;
    use crate::model::work::WorkItem;
    use chrono::{TimeZone, Utc};

    fn item(id: &str) -> WorkItem {
        WorkItem::new(
            "accel",
            id,
            "hardware_request",
            "Swap power supply",
            WorkflowState::Submitted,
            Utc.timestamp_opt(100, 0).unwrap(),
        )
    }

    #[test]
    fn save_then_find_roundtrips() {
        let repo = MemoryRepository::new();
        let mut work = item("wr-1");
        repo.save(&mut work).unwrap();
        assert_eq!(work.version, 1);

        let loaded = repo.find_by_domain_and_id("accel", "wr-1").unwrap().unwrap();
        assert_eq!(loaded, work);
        assert!(repo.find_by_domain_and_id("accel", "wr-9").unwrap().is_none());
    }

    #[test]
    fn save_rejects_stale_version() {
        let repo = MemoryRepository::new();
        let mut work = item("wr-1");
        repo.save(&mut work).unwrap();

        let mut stale = work.clone();
        stale.version = 0;
        let err = repo.save(&mut stale).unwrap_err();
        assert!(matches!(err, SaveError::Conflict { expected: 0, found: 1, .. }));
    }

    #[test]
    fn find_children_filters_by_parent_and_domain() {
        let repo = MemoryRepository::new();
        let mut parent = item("wr-p");
        repo.save(&mut parent).unwrap();

        let mut child = item("wr-c");
        child.parent_work_id = Some("wr-p".into());
        repo.save(&mut child).unwrap();

        let mut stranger = item("wr-s");
        stranger.domain_id = "cryo".into();
        stranger.parent_work_id = Some("wr-p".into());
        repo.save(&mut stranger).unwrap();

        let children = repo.find_children("accel", "wr-p").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].work_id, "wr-c");
    }

    #[test]
    fn memory_lov_membership() {
        let mut lov = MemoryLovCatalog::new();
        lov.insert("shop_groups", "magnet_shop");
        assert!(lov.contains("magnet_shop", "shop_groups").unwrap());
        assert!(!lov.contains("magnet_shop", "urgency_levels").unwrap());
        assert!(!lov.contains("paint_shop", "shop_groups").unwrap());
    }

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.allowed("anyone", "work:update", "accel/wr-1"));
    }
}
