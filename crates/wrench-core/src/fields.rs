//! Dynamic attribute validation.
//!
//! [`validate_fields`] checks a set of custom-field values against a work
//! type's attribute schema and the LOV catalogs. All five checks run to
//! completion and accumulate every violation found; the validator is
//! **never** fail-fast, so a single call reports the complete set of
//! problems with a create/update request.
//!
//! Values are supplied as a sequence of `(field_id, value)` pairs rather
//! than a map so duplicate ids can be rejected before deduplication.
//!
//! Side effects: none. The only external read is the LOV membership query.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::model::value::{CustomFieldValue, ValueKind};
use crate::model::work_type::AttributeSchema;
use crate::repo::LovCatalog;

// ---------------------------------------------------------------------------
// FieldViolation
// ---------------------------------------------------------------------------

/// One validation failure. A report may carry many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum FieldViolation {
    /// The same field id appears more than once in the request.
    DuplicateAttribute { id: String },
    /// The field id is not declared by the work type's schema.
    UnknownAttribute { id: String },
    /// The value's kind differs from the schema's declared kind.
    TypeMismatch {
        id: String,
        expected: ValueKind,
        actual: ValueKind,
    },
    /// A LOV value references a member absent from its catalog.
    UnknownLovMember { id: String, member: String },
    /// A mandatory field has no value.
    MissingMandatory { id: String },
}

impl FieldViolation {
    /// The field id this violation is about.
    #[must_use]
    pub fn field_id(&self) -> &str {
        match self {
            Self::DuplicateAttribute { id }
            | Self::UnknownAttribute { id }
            | Self::TypeMismatch { id, .. }
            | Self::UnknownLovMember { id, .. }
            | Self::MissingMandatory { id } => id,
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAttribute { id } => {
                write!(f, "field '{id}' appears more than once")
            }
            Self::UnknownAttribute { id } => {
                write!(f, "field '{id}' is not declared by the work type")
            }
            Self::TypeMismatch {
                id,
                expected,
                actual,
            } => write!(f, "field '{id}' expects {expected}, got {actual}"),
            Self::UnknownLovMember { id, member } => {
                write!(f, "field '{id}' references unknown catalog member '{member}'")
            }
            Self::MissingMandatory { id } => {
                write!(f, "mandatory field '{id}' is missing")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FieldReport
// ---------------------------------------------------------------------------

/// The accumulated outcome of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    /// Every violation found, in check order: duplicates and per-value
    /// problems first (request order), then missing mandatories (schema
    /// order).
    pub violations: Vec<FieldViolation>,
}

impl FieldReport {
    /// Returns `true` when no violation was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// Ids of mandatory fields reported missing, in schema order.
    #[must_use]
    pub fn missing_mandatory(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                FieldViolation::MissingMandatory { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for FieldReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return f.write_str("all fields valid");
        }
        write!(f, "{} field violation(s):", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate `values` against `schema`, consulting `lov` for catalog
/// membership. Runs every check and returns the complete violation list.
///
/// # Errors
///
/// Returns an error only when a LOV catalog query itself fails; catalog
/// *misses* are violations, not errors.
pub fn validate_fields(
    schema: &[AttributeSchema],
    values: &[(String, CustomFieldValue)],
    lov: &dyn LovCatalog,
) -> anyhow::Result<FieldReport> {
    let mut report = FieldReport::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for (id, value) in values {
        if !seen.insert(id.as_str()) {
            report
                .violations
                .push(FieldViolation::DuplicateAttribute { id: id.clone() });
            continue;
        }

        let Some(attr) = schema.iter().find(|a| a.id == *id) else {
            report
                .violations
                .push(FieldViolation::UnknownAttribute { id: id.clone() });
            continue;
        };

        if value.kind() != attr.kind {
            report.violations.push(FieldViolation::TypeMismatch {
                id: id.clone(),
                expected: attr.kind,
                actual: value.kind(),
            });
            continue;
        }

        // Referential check for LOV values. The schema constructor
        // guarantees lov_ref is present when kind == Lov.
        if let (Some(member), Some(catalog)) = (value.as_lov_member(), attr.lov_ref.as_deref()) {
            if !lov.contains(member, catalog)? {
                report.violations.push(FieldViolation::UnknownLovMember {
                    id: id.clone(),
                    member: member.to_string(),
                });
            }
        }
    }

    for attr in schema {
        if attr.mandatory && !seen.contains(attr.id.as_str()) {
            report
                .violations
                .push(FieldViolation::MissingMandatory { id: attr.id.clone() });
        }
    }

    if !report.is_ok() {
        debug!(violations = report.violations.len(), "field validation failed");
    }
    Ok(report)
}
