//! Custom-field value kinds and the tagged value union.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The declared kind of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Number,
    Double,
    String,
    Date,
    DateTime,
    Lov,
    Attachments,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Double => "double",
            Self::String => "string",
            Self::Date => "date",
            Self::DateTime => "date_time",
            Self::Lov => "lov",
            Self::Attachments => "attachments",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a kind from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError {
    pub got: String,
}

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value kind: '{}'", self.got)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for ValueKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" => Ok(Self::Boolean),
            "number" => Ok(Self::Number),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            "date" => Ok(Self::Date),
            "date_time" | "datetime" => Ok(Self::DateTime),
            "lov" => Ok(Self::Lov),
            "attachments" => Ok(Self::Attachments),
            _ => Err(ParseKindError { got: s.to_string() }),
        }
    }
}

/// A single custom-field value, tagged with its kind.
///
/// For [`ValueKind::Lov`] the payload is the catalog **member identifier**,
/// never the display label. Attachments carry attachment ids only; attachment
/// bytes live outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CustomFieldValue {
    Boolean(bool),
    Number(i64),
    Double(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Lov(String),
    Attachments(Vec<String>),
}

impl CustomFieldValue {
    /// The kind this value carries.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Number(_) => ValueKind::Number,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::Date(_) => ValueKind::Date,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Lov(_) => ValueKind::Lov,
            Self::Attachments(_) => ValueKind::Attachments,
        }
    }

    /// The LOV member identifier, if this is a LOV value.
    #[must_use]
    pub fn as_lov_member(&self) -> Option<&str> {
        match self {
            Self::Lov(member) => Some(member),
            _ => None,
        }
    }
}

impl fmt::Display for CustomFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) | Self::Lov(v) => f.write_str(v),
            Self::Date(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Attachments(ids) => f.write_str(&ids.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomFieldValue, ValueKind};
    use chrono::NaiveDate;
    use std::str::FromStr;

    #[test]
    fn kind_display_parse_roundtrips() {
        for kind in [
            ValueKind::Boolean,
            ValueKind::Number,
            ValueKind::Double,
            ValueKind::String,
            ValueKind::Date,
            ValueKind::DateTime,
            ValueKind::Lov,
            ValueKind::Attachments,
        ] {
            let rendered = kind.to_string();
            assert_eq!(ValueKind::from_str(&rendered).unwrap(), kind);
        }
    }

    #[test]
    fn kind_parse_accepts_datetime_alias() {
        assert_eq!(ValueKind::from_str("datetime").unwrap(), ValueKind::DateTime);
    }

    #[test]
    fn value_reports_its_kind() {
        assert_eq!(CustomFieldValue::Boolean(true).kind(), ValueKind::Boolean);
        assert_eq!(CustomFieldValue::Number(42).kind(), ValueKind::Number);
        assert_eq!(
            CustomFieldValue::Lov("magnet_shop".into()).kind(),
            ValueKind::Lov
        );
        assert_eq!(
            CustomFieldValue::Attachments(vec!["att-1".into()]).kind(),
            ValueKind::Attachments
        );
    }

    #[test]
    fn lov_member_accessor() {
        let v = CustomFieldValue::Lov("vacuum_group".into());
        assert_eq!(v.as_lov_member(), Some("vacuum_group"));
        assert_eq!(CustomFieldValue::Number(1).as_lov_member(), None);
    }

    #[test]
    fn value_json_is_kind_tagged() {
        let v = CustomFieldValue::Date(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"kind":"date","value":"2026-03-14"}"#);

        let back: CustomFieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
