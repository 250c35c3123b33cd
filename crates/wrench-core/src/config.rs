//! Project configuration, loaded from `.wrench/config.toml`.
//!
//! Every field defaults so a missing file or a partial file both work.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            propagation: PropagationConfig::default(),
        }
    }
}

/// Retry settings for propagation failures, in config-friendly units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Convert to the policy the event processor consumes.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Re-evaluate parents automatically after every applied transition.
    #[serde(default = "default_true")]
    pub auto: bool,
    /// Hierarchy depth guard for one event.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            auto: default_true(),
            max_depth: default_max_depth(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_attempts() -> u32 {
    4
}

const fn default_base_delay_ms() -> u64 {
    250
}

const fn default_max_delay_ms() -> u64 {
    10_000
}

const fn default_max_depth() -> u32 {
    crate::event::DEFAULT_MAX_DEPTH
}

/// Load the project config from `<project_root>/.wrench/config.toml`.
/// A missing file yields the defaults; a malformed file is an error.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".wrench/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
}
