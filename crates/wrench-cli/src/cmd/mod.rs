//! Subcommand implementations.
//!
//! Each module owns one subcommand: a clap `Args` struct plus a `run_*`
//! function taking the shared [`Ctx`]. Commands render their own output
//! and return `Err` only after rendering a [`CliError`], so `main` can
//! exit non-zero without double-printing.

pub mod completions;
pub mod create;
pub mod init;
pub mod list;
pub mod lov;
pub mod move_cmd;
pub mod set;
pub mod show;
pub mod types;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};

use wrench_core::config::{load_project_config, ProjectConfig};
use wrench_core::db::Store;
use wrench_core::error::ErrorCode;
use wrench_core::model::value::{CustomFieldValue, ValueKind};
use wrench_core::model::work_type::WorkType;
use wrench_core::workflow::engine::WorkflowEngine;
use wrench_core::workflow::VariantSet;

use crate::output::{render_error, CliError, OutputMode};

/// Store location inside a project directory.
pub fn db_path(root: &Path) -> PathBuf {
    root.join(".wrench/wrench.sqlite3")
}

/// Shared state handed to every command except `init` and `completions`.
pub struct Ctx {
    pub root: PathBuf,
    /// Repository + catalog + work-type handle used by command bodies.
    pub store: Store,
    /// The engine owns its own store connection for work-type lookups.
    pub engine: WorkflowEngine<Store>,
    pub config: ProjectConfig,
    pub output: OutputMode,
    pub actor: String,
}

impl Ctx {
    /// Open the project at `root`.
    ///
    /// # Errors
    ///
    /// Fails with `E1001` when the project is not initialized, and with
    /// config/store errors otherwise.
    pub fn open(root: &Path, output: OutputMode, actor: String) -> Result<Self> {
        let path = db_path(root);
        if !path.exists() {
            return Err(fail(
                output,
                ErrorCode::NotInitialized,
                format!("no wrench project at {}", root.display()),
            ));
        }
        let config = match load_project_config(root) {
            Ok(config) => config,
            Err(err) => {
                return Err(fail(output, ErrorCode::ConfigParseError, err.to_string()));
            }
        };
        let store = Store::open(&path)?;
        let types = Store::open(&path)?;
        let variants = VariantSet::builtin().map_err(anyhow::Error::from)?;
        Ok(Self {
            root: root.to_path_buf(),
            store,
            engine: WorkflowEngine::new(variants, types),
            config,
            output,
            actor,
        })
    }
}

/// Render a [`CliError`] and return an error carrying the same message.
pub fn fail(output: OutputMode, code: ErrorCode, message: impl Into<String>) -> anyhow::Error {
    let err = CliError::new(code, message);
    if let Err(render) = render_error(output, &err) {
        return render;
    }
    anyhow::anyhow!("{}", err.message)
}

/// Parse one `id=value` field assignment against a work type's schema.
///
/// The value text is interpreted per the declared kind. Unknown field ids
/// parse as strings so the validator can report them as
/// `UnknownAttribute` instead of this function guessing.
///
/// # Errors
///
/// Returns an error when the assignment has no `=` or the value text does
/// not parse as the declared kind.
pub fn parse_field_assignment(
    work_type: &WorkType,
    raw: &str,
) -> Result<(String, CustomFieldValue)> {
    let Some((id, text)) = raw.split_once('=') else {
        anyhow::bail!("field assignment '{raw}' is not of the form id=value");
    };
    let id = id.trim();
    let text = text.trim();

    let Some(attr) = work_type.attribute(id) else {
        return Ok((id.to_string(), CustomFieldValue::String(text.to_string())));
    };

    let value = match attr.kind {
        ValueKind::Boolean => CustomFieldValue::Boolean(
            text.parse::<bool>()
                .map_err(|_| anyhow::anyhow!("field '{id}' expects true or false, got '{text}'"))?,
        ),
        ValueKind::Number => CustomFieldValue::Number(
            text.parse::<i64>()
                .map_err(|_| anyhow::anyhow!("field '{id}' expects an integer, got '{text}'"))?,
        ),
        ValueKind::Double => CustomFieldValue::Double(
            text.parse::<f64>()
                .map_err(|_| anyhow::anyhow!("field '{id}' expects a number, got '{text}'"))?,
        ),
        ValueKind::String => CustomFieldValue::String(text.to_string()),
        ValueKind::Date => CustomFieldValue::Date(
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|_| anyhow::anyhow!("field '{id}' expects YYYY-MM-DD, got '{text}'"))?,
        ),
        ValueKind::DateTime => CustomFieldValue::DateTime(
            DateTime::parse_from_rfc3339(text)
                .map_err(|_| {
                    anyhow::anyhow!("field '{id}' expects an RFC 3339 timestamp, got '{text}'")
                })?
                .with_timezone(&Utc),
        ),
        ValueKind::Lov => CustomFieldValue::Lov(text.to_string()),
        ValueKind::Attachments => CustomFieldValue::Attachments(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    };
    Ok((id.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::parse_field_assignment;
    use wrench_core::model::value::{CustomFieldValue, ValueKind};
    use wrench_core::model::work_type::{AttributeSchema, WorkType};
    use wrench_core::workflow::VariantId;

    fn work_type() -> WorkType {
        WorkType::new(
            "t",
            "T",
            VariantId::Record,
            vec![
                AttributeSchema::new("count", "Count", ValueKind::Number, false),
                AttributeSchema::new("due", "Due", ValueKind::Date, false),
                AttributeSchema::lov("shop", "Shop", false, "shops"),
                AttributeSchema::new("files", "Files", ValueKind::Attachments, false),
            ],
        )
        .unwrap()
    }

    #[test]
    fn parses_by_declared_kind() {
        let wt = work_type();
        assert_eq!(
            parse_field_assignment(&wt, "count=3").unwrap().1,
            CustomFieldValue::Number(3)
        );
        assert_eq!(
            parse_field_assignment(&wt, "shop=magnet_shop").unwrap().1,
            CustomFieldValue::Lov("magnet_shop".into())
        );
        assert_eq!(
            parse_field_assignment(&wt, "files=a.pdf, b.pdf").unwrap().1,
            CustomFieldValue::Attachments(vec!["a.pdf".into(), "b.pdf".into()])
        );
    }

    #[test]
    fn unknown_id_falls_back_to_string() {
        let wt = work_type();
        assert_eq!(
            parse_field_assignment(&wt, "mystery=x").unwrap().1,
            CustomFieldValue::String("x".into())
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        let wt = work_type();
        assert!(parse_field_assignment(&wt, "count=three").is_err());
        assert!(parse_field_assignment(&wt, "due=tomorrow").is_err());
        assert!(parse_field_assignment(&wt, "no-equals-sign").is_err());
    }
}
