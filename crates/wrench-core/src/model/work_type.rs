//! Work types and their attribute schemas.
//!
//! A work type declares which custom fields its work items may carry and
//! which workflow variant governs them. Schemas are plain data consulted
//! directly by the validator; there is no runtime field discovery.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::value::ValueKind;
use crate::workflow::VariantId;

/// One declared custom field of a work type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Field id, unique within the work type.
    pub id: String,
    /// Human-readable field name.
    pub name: String,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Whether a value must be present on every work item of this type.
    #[serde(default)]
    pub mandatory: bool,
    /// LOV catalog reference. Required, and only meaningful, when
    /// `kind == ValueKind::Lov`.
    #[serde(default)]
    pub lov_ref: Option<String>,
}

impl AttributeSchema {
    /// Shorthand for a non-LOV attribute.
    #[must_use]
    pub fn new(id: &str, name: &str, kind: ValueKind, mandatory: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            mandatory,
            lov_ref: None,
        }
    }

    /// Shorthand for a LOV attribute bound to a catalog reference.
    #[must_use]
    pub fn lov(id: &str, name: &str, mandatory: bool, catalog: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ValueKind::Lov,
            mandatory,
            lov_ref: Some(catalog.to_string()),
        }
    }
}

/// Errors rejected at work-type construction time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate attribute id '{0}' in work type")]
    DuplicateAttributeId(String),

    #[error("attribute '{0}' has kind lov but no catalog reference")]
    MissingLovRef(String),

    #[error("attribute '{id}' has kind {kind} but carries a catalog reference")]
    UnexpectedLovRef { id: String, kind: ValueKind },
}

/// A named category of work, with its schema and governing variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkType {
    pub id: String,
    pub title: String,
    /// Ordered attribute declarations. Order matters for reporting: the
    /// validator emits missing-mandatory violations in schema order.
    pub attributes: Vec<AttributeSchema>,
    /// Which workflow variant governs items of this type.
    pub variant: VariantId,
}

impl WorkType {
    /// Build a work type, rejecting malformed schemas.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] on duplicate attribute ids, a LOV attribute
    /// without a catalog reference, or a non-LOV attribute with one.
    pub fn new(
        id: &str,
        title: &str,
        variant: VariantId,
        attributes: Vec<AttributeSchema>,
    ) -> Result<Self, SchemaError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for attr in &attributes {
            if !seen.insert(attr.id.as_str()) {
                return Err(SchemaError::DuplicateAttributeId(attr.id.clone()));
            }
            match (attr.kind, attr.lov_ref.as_deref()) {
                (ValueKind::Lov, None) => {
                    return Err(SchemaError::MissingLovRef(attr.id.clone()));
                }
                (kind, Some(_)) if kind != ValueKind::Lov => {
                    return Err(SchemaError::UnexpectedLovRef {
                        id: attr.id.clone(),
                        kind,
                    });
                }
                _ => {}
            }
        }
        Ok(Self {
            id: id.to_string(),
            title: title.to_string(),
            attributes,
            variant,
        })
    }

    /// Look up an attribute declaration by field id.
    #[must_use]
    pub fn attribute(&self, field_id: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.id == field_id)
    }

    /// Ids of all mandatory attributes, in schema order.
    #[must_use]
    pub fn mandatory_ids(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.mandatory)
            .map(|a| a.id.as_str())
            .collect()
    }
}
