//! The [`Store`]: SQLite-backed implementation of the collaborator traits.
//!
//! Work items are persisted as a base row plus detail rows for status
//! history and custom fields, rewritten together inside one transaction.
//! `save` enforces the optimistic-concurrency compare-and-swap on the
//! `version` column; the engine and propagator stay lock-free because
//! at-most-one concurrent transition per item is enforced here.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::open_store_db;
use crate::model::state::WorkflowState;
use crate::model::value::CustomFieldValue;
use crate::model::work::{Status, WorkItem};
use crate::model::work_type::{AttributeSchema, WorkType};
use crate::repo::{LovCatalog, SaveError, WorkRepository, WorkTypes};
use crate::workflow::VariantId;

/// SQLite store handle. One per process is plenty; SQLite serializes
/// writers internally.
pub struct Store {
    conn: Connection,
}

// ---------------------------------------------------------------------------
// Construction and seeding
// ---------------------------------------------------------------------------

impl Store {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: open_store_db(path)?,
        })
    }

    /// In-memory store for tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory store")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable foreign keys")?;
        super::migrations::migrate(&mut conn).context("apply store migrations")?;
        Ok(Self { conn })
    }

    /// Install the built-in work types and example LOV catalogs. Safe to
    /// call repeatedly; existing rows are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn seed_builtin(&self) -> Result<()> {
        for work_type in builtin_work_types()? {
            if self.find(&work_type.id)?.is_none() {
                self.insert_work_type(&work_type)?;
            }
        }
        for (catalog, member, label) in BUILTIN_LOV_MEMBERS {
            self.insert_lov_member(catalog, member, label)?;
        }
        debug!("seeded built-in work types and catalogs");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Work types
    // -----------------------------------------------------------------------

    /// Insert or replace a work type and its attribute schema.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn insert_work_type(&self, work_type: &WorkType) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO work_types (work_type_id, title, variant)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(work_type_id) DO UPDATE SET
                 title = excluded.title,
                 variant = excluded.variant",
            params![work_type.id, work_type.title, work_type.variant.as_str()],
        )?;
        tx.execute(
            "DELETE FROM attribute_schemas WHERE work_type_id = ?1",
            params![work_type.id],
        )?;
        for (position, attr) in work_type.attributes.iter().enumerate() {
            tx.execute(
                "INSERT INTO attribute_schemas
                     (work_type_id, field_id, name, kind, mandatory, lov_ref, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    work_type.id,
                    attr.id,
                    attr.name,
                    attr.kind.as_str(),
                    i64::from(attr.mandatory),
                    attr.lov_ref,
                    position as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// All registered work types, by id.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn list_work_types(&self) -> Result<Vec<WorkType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT work_type_id FROM work_types ORDER BY work_type_id")?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        let mut types = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(work_type) = self.find(&id)? {
                types.push(work_type);
            }
        }
        Ok(types)
    }

    // -----------------------------------------------------------------------
    // LOV catalogs
    // -----------------------------------------------------------------------

    /// Add a member to a catalog. Existing members are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn insert_lov_member(&self, catalog_ref: &str, member_id: &str, label: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO lov_members (catalog_ref, member_id, label)
             VALUES (?1, ?2, ?3)",
            params![catalog_ref, member_id, label],
        )?;
        Ok(())
    }

    /// Whether a catalog reference has any members at all.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn catalog_exists(&self, catalog_ref: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM lov_members WHERE catalog_ref = ?1)",
            params![catalog_ref],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// All distinct catalog references.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn list_catalogs(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT catalog_ref FROM lov_members ORDER BY catalog_ref")?;
        let catalogs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(catalogs)
    }

    /// `(member_id, label)` pairs of one catalog.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn list_lov_members(&self, catalog_ref: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id, label FROM lov_members
             WHERE catalog_ref = ?1 ORDER BY member_id",
        )?;
        let members = stmt
            .query_map(params![catalog_ref], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(members)
    }

    // -----------------------------------------------------------------------
    // Work items
    // -----------------------------------------------------------------------

    /// Work items, optionally filtered by domain and state.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures.
    pub fn list_work(
        &self,
        domain_id: Option<&str>,
        state: Option<WorkflowState>,
    ) -> Result<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain_id, work_id FROM work_items
             WHERE (?1 IS NULL OR domain_id = ?1)
               AND (?2 IS NULL OR state = ?2)
             ORDER BY domain_id, work_id",
        )?;
        let keys: Vec<(String, String)> = stmt
            .query_map(
                params![domain_id, state.map(WorkflowState::as_str)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        let mut items = Vec::with_capacity(keys.len());
        for (domain, work) in keys {
            if let Some(item) = self.find_by_domain_and_id(&domain, &work)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn hydrate(&self, base: BaseRow) -> Result<WorkItem> {
        let mut stmt = self.conn.prepare(
            "SELECT state, comment, at_us FROM status_history
             WHERE domain_id = ?1 AND work_id = ?2 ORDER BY seq",
        )?;
        let status_history: Vec<Status> = stmt
            .query_map(params![base.domain_id, base.work_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(state, comment, at_us)| {
                Ok(Status {
                    state: parse_state(&state)?,
                    comment,
                    at: from_us(at_us)?,
                })
            })
            .collect::<Result<_>>()?;
        drop(stmt);

        let mut stmt = self.conn.prepare(
            "SELECT field_id, value_json FROM custom_fields
             WHERE domain_id = ?1 AND work_id = ?2",
        )?;
        let custom_fields = stmt
            .query_map(params![base.domain_id, base.work_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(field_id, value_json)| {
                let value: CustomFieldValue = serde_json::from_str(&value_json)
                    .with_context(|| format!("decode custom field '{field_id}'"))?;
                Ok((field_id, value))
            })
            .collect::<Result<_>>()?;

        Ok(WorkItem {
            status: Status {
                state: parse_state(&base.state)?,
                comment: base.status_comment,
                at: from_us(base.status_at_us)?,
            },
            domain_id: base.domain_id,
            work_id: base.work_id,
            parent_work_id: base.parent_work_id,
            work_type_id: base.work_type_id,
            title: base.title,
            description: base.description,
            status_history,
            custom_fields,
            version: base.version,
            created_at: from_us(base.created_at_us)?,
            updated_at: from_us(base.updated_at_us)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl WorkRepository for Store {
    fn find_by_domain_and_id(&self, domain_id: &str, work_id: &str) -> Result<Option<WorkItem>> {
        let base = self
            .conn
            .query_row(
                &format!("{BASE_SELECT} WHERE domain_id = ?1 AND work_id = ?2"),
                params![domain_id, work_id],
                base_row,
            )
            .optional()?;
        base.map(|b| self.hydrate(b)).transpose()
    }

    fn find_children(&self, domain_id: &str, parent_work_id: &str) -> Result<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BASE_SELECT} WHERE domain_id = ?1 AND parent_work_id = ?2 ORDER BY work_id"
        ))?;
        let bases: Vec<BaseRow> = stmt
            .query_map(params![domain_id, parent_work_id], base_row)?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        bases.into_iter().map(|b| self.hydrate(b)).collect()
    }

    fn save(&self, work: &mut WorkItem) -> Result<(), SaveError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(anyhow::Error::from)?;

        let found: Option<u64> = tx
            .query_row(
                "SELECT version FROM work_items WHERE domain_id = ?1 AND work_id = ?2",
                params![work.domain_id, work.work_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(anyhow::Error::from)?;

        if let Some(found) = found {
            if found != work.version {
                return Err(SaveError::Conflict {
                    domain_id: work.domain_id.clone(),
                    work_id: work.work_id.clone(),
                    expected: work.version,
                    found,
                });
            }
        }

        work.version += 1;
        write_work_rows(&tx, work).map_err(|e| {
            work.version -= 1; // roll back the in-memory bump with the tx
            e
        })?;
        tx.commit().map_err(anyhow::Error::from)?;
        Ok(())
    }
}

impl LovCatalog for Store {
    fn contains(&self, member_id: &str, catalog_ref: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM lov_members
                 WHERE catalog_ref = ?1 AND member_id = ?2
             )",
            params![catalog_ref, member_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl WorkTypes for Store {
    fn find(&self, work_type_id: &str) -> Result<Option<WorkType>> {
        let header: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT title, variant FROM work_types WHERE work_type_id = ?1",
                params![work_type_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((title, variant)) = header else {
            return Ok(None);
        };
        let variant = VariantId::from_str(&variant).map_err(|e| anyhow!(e))?;

        let mut stmt = self.conn.prepare(
            "SELECT field_id, name, kind, mandatory, lov_ref FROM attribute_schemas
             WHERE work_type_id = ?1 ORDER BY position",
        )?;
        let attributes: Vec<AttributeSchema> = stmt
            .query_map(params![work_type_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(id, name, kind, mandatory, lov_ref)| {
                Ok(AttributeSchema {
                    id,
                    name,
                    kind: kind.parse().map_err(anyhow::Error::from)?,
                    mandatory: mandatory != 0,
                    lov_ref,
                })
            })
            .collect::<Result<_>>()?;

        let work_type = WorkType::new(work_type_id, &title, variant, attributes)
            .with_context(|| format!("stored schema for '{work_type_id}' is malformed"))?;
        Ok(Some(work_type))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BASE_SELECT: &str = "SELECT domain_id, work_id, work_type_id, parent_work_id, title, \
     description, state, status_comment, status_at_us, version, created_at_us, updated_at_us \
     FROM work_items";

struct BaseRow {
    domain_id: String,
    work_id: String,
    work_type_id: String,
    parent_work_id: Option<String>,
    title: String,
    description: Option<String>,
    state: String,
    status_comment: String,
    status_at_us: i64,
    version: u64,
    created_at_us: i64,
    updated_at_us: i64,
}

fn base_row(row: &Row<'_>) -> rusqlite::Result<BaseRow> {
    Ok(BaseRow {
        domain_id: row.get(0)?,
        work_id: row.get(1)?,
        work_type_id: row.get(2)?,
        parent_work_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        state: row.get(6)?,
        status_comment: row.get(7)?,
        status_at_us: row.get(8)?,
        version: row.get(9)?,
        created_at_us: row.get(10)?,
        updated_at_us: row.get(11)?,
    })
}

fn write_work_rows(tx: &rusqlite::Transaction<'_>, work: &WorkItem) -> Result<(), SaveError> {
    let result: Result<()> = (|| {
        tx.execute(
            "INSERT INTO work_items
                 (domain_id, work_id, work_type_id, parent_work_id, title, description,
                  state, status_comment, status_at_us, version, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(domain_id, work_id) DO UPDATE SET
                 work_type_id = excluded.work_type_id,
                 parent_work_id = excluded.parent_work_id,
                 title = excluded.title,
                 description = excluded.description,
                 state = excluded.state,
                 status_comment = excluded.status_comment,
                 status_at_us = excluded.status_at_us,
                 version = excluded.version,
                 created_at_us = excluded.created_at_us,
                 updated_at_us = excluded.updated_at_us",
            params![
                work.domain_id,
                work.work_id,
                work.work_type_id,
                work.parent_work_id,
                work.title,
                work.description,
                work.status.state.as_str(),
                work.status.comment,
                to_us(work.status.at),
                work.version,
                to_us(work.created_at),
                to_us(work.updated_at),
            ],
        )?;

        tx.execute(
            "DELETE FROM status_history WHERE domain_id = ?1 AND work_id = ?2",
            params![work.domain_id, work.work_id],
        )?;
        for (seq, status) in work.status_history.iter().enumerate() {
            tx.execute(
                "INSERT INTO status_history (domain_id, work_id, seq, state, comment, at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    work.domain_id,
                    work.work_id,
                    seq as i64,
                    status.state.as_str(),
                    status.comment,
                    to_us(status.at),
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM custom_fields WHERE domain_id = ?1 AND work_id = ?2",
            params![work.domain_id, work.work_id],
        )?;
        for (field_id, value) in &work.custom_fields {
            let value_json = serde_json::to_string(value)
                .with_context(|| format!("encode custom field '{field_id}'"))?;
            tx.execute(
                "INSERT INTO custom_fields (domain_id, work_id, field_id, value_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![work.domain_id, work.work_id, field_id, value_json],
            )?;
        }
        Ok(())
    })();
    result.map_err(SaveError::Other)
}

fn to_us(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_us(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or_else(|| anyhow!("timestamp out of range: {us}"))
}

fn parse_state(raw: &str) -> Result<WorkflowState> {
    WorkflowState::from_str(raw).map_err(anyhow::Error::from)
}

// ---------------------------------------------------------------------------
// Built-in seed data
// ---------------------------------------------------------------------------

fn builtin_work_types() -> Result<Vec<WorkType>> {
    use crate::model::value::ValueKind;

    let hardware_report = WorkType::new(
        "hardware_report",
        "Hardware Report",
        VariantId::Report,
        vec![
            AttributeSchema::new("title", "Title", ValueKind::String, true),
            AttributeSchema::new("description", "Description", ValueKind::String, true),
            AttributeSchema::lov("location", "Location", true, "locations"),
            AttributeSchema::lov("shop_group", "Shop Group", true, "shop_groups"),
            AttributeSchema::lov("subsystem", "Subsystem", true, "subsystems"),
            AttributeSchema::lov("urgency", "Urgency", true, "urgency_levels"),
            AttributeSchema::new("estimated_hours", "Estimated Hours", ValueKind::Double, false),
            AttributeSchema::new("due_date", "Due Date", ValueKind::Date, false),
            AttributeSchema::new("attachments", "Attachments", ValueKind::Attachments, false),
        ],
    )?;

    let hardware_request = WorkType::new(
        "hardware_request",
        "Hardware Request",
        VariantId::Request,
        vec![
            AttributeSchema::new("title", "Title", ValueKind::String, true),
            AttributeSchema::new("description", "Description", ValueKind::String, false),
            AttributeSchema::lov("shop_group", "Shop Group", false, "shop_groups"),
            AttributeSchema::new("quantity", "Quantity", ValueKind::Number, false),
            AttributeSchema::new("needed_by", "Needed By", ValueKind::Date, false),
        ],
    )?;

    let activity_record = WorkType::new(
        "activity_record",
        "Activity Record",
        VariantId::Record,
        vec![
            AttributeSchema::new("title", "Title", ValueKind::String, true),
            AttributeSchema::new("note", "Note", ValueKind::String, false),
            AttributeSchema::new("reviewed", "Reviewed", ValueKind::Boolean, false),
        ],
    )?;

    Ok(vec![hardware_report, hardware_request, activity_record])
}

const BUILTIN_LOV_MEMBERS: &[(&str, &str, &str)] = &[
    ("locations", "sector_01", "Sector 01"),
    ("locations", "sector_02", "Sector 02"),
    ("locations", "klystron_gallery", "Klystron Gallery"),
    ("shop_groups", "magnet_shop", "Magnet Shop"),
    ("shop_groups", "vacuum_shop", "Vacuum Shop"),
    ("shop_groups", "rf_shop", "RF Shop"),
    ("subsystems", "controls", "Controls"),
    ("subsystems", "cryogenics", "Cryogenics"),
    ("subsystems", "rf", "RF"),
    ("urgency_levels", "low", "Low"),
    ("urgency_levels", "medium", "Medium"),
    ("urgency_levels", "high", "High"),
    ("urgency_levels", "immediate", "Immediate"),
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
