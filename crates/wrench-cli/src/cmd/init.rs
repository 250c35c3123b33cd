//! `wr init` — initialize a wrench project.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

use wrench_core::config::ProjectConfig;
use wrench_core::db::Store;

use crate::cmd::db_path;
use crate::output::{render_success, OutputMode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-seed built-in work types and catalogs even if already present.
    #[arg(long)]
    pub reseed: bool,
}

pub fn run_init(args: &InitArgs, output: OutputMode, root: &Path) -> Result<()> {
    let path = db_path(root);
    let fresh = !path.exists();

    let store = Store::open(&path)?;
    if fresh || args.reseed {
        store.seed_builtin().context("seed built-in work types")?;
    }

    let config_path = root.join(".wrench/config.toml");
    if !config_path.exists() {
        let rendered =
            toml::to_string_pretty(&ProjectConfig::default()).context("render default config")?;
        std::fs::write(&config_path, rendered)
            .with_context(|| format!("write {}", config_path.display()))?;
    }

    let message = if fresh {
        format!("Initialized wrench project in {}", root.display())
    } else {
        format!("Project in {} already initialized", root.display())
    };
    render_success(output, &message)
}
