//! Canonical SQLite schema for the wrench store.
//!
//! Three independently keyed collections, matching the logical layout:
//! - `work_items` (+ `status_history`, `custom_fields`) keyed by domain + id
//! - `work_types` (+ `attribute_schemas`)
//! - `lov_members`
//!
//! There are no foreign keys **between** the collections: referential
//! checks (work type exists, LOV member exists) are application-level
//! invariants enforced by the validator and engine. Detail tables within a
//! collection do cascade from their owner row.

/// Migration v1: all collections plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS work_items (
    domain_id TEXT NOT NULL,
    work_id TEXT NOT NULL,
    work_type_id TEXT NOT NULL,
    parent_work_id TEXT,
    title TEXT NOT NULL,
    description TEXT,
    state TEXT NOT NULL CHECK (state IN (
        'created', 'submitted', 'pending_assignment', 'pending_paperwork',
        'pending_approval', 'ready_for_work', 'approved', 'in_progress',
        'work_complete', 'review_to_close', 'closed')),
    status_comment TEXT NOT NULL DEFAULT '',
    status_at_us INTEGER NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    PRIMARY KEY (domain_id, work_id)
);

CREATE INDEX IF NOT EXISTS idx_work_items_parent
    ON work_items(domain_id, parent_work_id);
CREATE INDEX IF NOT EXISTS idx_work_items_state
    ON work_items(domain_id, state);

CREATE TABLE IF NOT EXISTS status_history (
    domain_id TEXT NOT NULL,
    work_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    state TEXT NOT NULL,
    comment TEXT NOT NULL DEFAULT '',
    at_us INTEGER NOT NULL,
    PRIMARY KEY (domain_id, work_id, seq),
    FOREIGN KEY (domain_id, work_id)
        REFERENCES work_items(domain_id, work_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS custom_fields (
    domain_id TEXT NOT NULL,
    work_id TEXT NOT NULL,
    field_id TEXT NOT NULL,
    value_json TEXT NOT NULL,
    PRIMARY KEY (domain_id, work_id, field_id),
    FOREIGN KEY (domain_id, work_id)
        REFERENCES work_items(domain_id, work_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS work_types (
    work_type_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    variant TEXT NOT NULL CHECK (variant IN ('record', 'request', 'report'))
);

CREATE TABLE IF NOT EXISTS attribute_schemas (
    work_type_id TEXT NOT NULL
        REFERENCES work_types(work_type_id) ON DELETE CASCADE,
    field_id TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    mandatory INTEGER NOT NULL DEFAULT 0 CHECK (mandatory IN (0, 1)),
    lov_ref TEXT,
    position INTEGER NOT NULL,
    PRIMARY KEY (work_type_id, field_id)
);

CREATE TABLE IF NOT EXISTS lov_members (
    catalog_ref TEXT NOT NULL,
    member_id TEXT NOT NULL,
    label TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (catalog_ref, member_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);
";
