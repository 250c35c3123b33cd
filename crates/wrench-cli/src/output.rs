//! Shared output layer for text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: readable text for humans, stable JSON for scripts and
//! agents. Errors always carry their `E####` code so callers can branch
//! without parsing prose.

use serde::Serialize;
use std::io::{self, Write};

use wrench_core::error::ErrorCode;

/// The two output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON, one object per result.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    #[must_use]
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// A rendered CLI failure: stable code, message, optional remediation hint.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl CliError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            hint: code.hint(),
        }
    }
}

/// Render a value as pretty JSON to stdout.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn render_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Render a success message in the requested mode.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn render_success(mode: OutputMode, message: &str) -> anyhow::Result<()> {
    if mode.is_json() {
        render_json(&serde_json::json!({ "ok": true, "message": message }))
    } else {
        writeln!(io::stdout().lock(), "{message}")?;
        Ok(())
    }
}

/// Render an error in the requested mode, to stderr.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn render_error(mode: OutputMode, err: &CliError) -> anyhow::Result<()> {
    let mut stderr = io::stderr().lock();
    if mode.is_json() {
        serde_json::to_writer_pretty(&mut stderr, &serde_json::json!({ "error": err }))?;
        writeln!(stderr)?;
    } else {
        writeln!(stderr, "error[{}]: {}", err.code, err.message)?;
        if let Some(hint) = err.hint {
            writeln!(stderr, "hint: {hint}")?;
        }
    }
    Ok(())
}

/// Render a left-aligned key/value line in text output.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn text_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

#[cfg(test)]
mod tests {
    use super::{CliError, OutputMode};
    use wrench_core::error::ErrorCode;

    #[test]
    fn mode_flags() {
        assert!(OutputMode::Json.is_json());
        assert!(!OutputMode::Text.is_json());
    }

    #[test]
    fn cli_error_carries_code_and_hint() {
        let err = CliError::new(ErrorCode::IllegalTransition, "submitted -> closed");
        assert_eq!(err.code, "E2002");
        assert!(err.hint.is_some());
    }

    #[test]
    fn cli_error_json_shape() {
        let err = CliError::new(ErrorCode::WorkNotFound, "accel/wr-9");
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["code"], "E2001");
        assert_eq!(json["message"], "accel/wr-9");
    }
}
