//! `wr lov` — inspect List-Of-Values catalogs.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use wrench_core::error::ErrorCode;

use crate::cmd::{fail, Ctx};
use crate::output::render_json;

#[derive(Args, Debug)]
pub struct LovArgs {
    /// Catalog reference to list. Omit to list all catalogs.
    pub catalog: Option<String>,
}

pub fn run_lov(args: &LovArgs, ctx: &Ctx) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match &args.catalog {
        None => {
            let catalogs = ctx.store.list_catalogs()?;
            if ctx.output.is_json() {
                return render_json(&catalogs);
            }
            for catalog in &catalogs {
                writeln!(out, "{catalog}")?;
            }
        }
        Some(catalog) => {
            if !ctx.store.catalog_exists(catalog)? {
                return Err(fail(
                    ctx.output,
                    ErrorCode::LovCatalogNotFound,
                    format!("catalog '{catalog}' has no members"),
                ));
            }
            let members = ctx.store.list_lov_members(catalog)?;
            if ctx.output.is_json() {
                let members: Vec<_> = members
                    .iter()
                    .map(|(id, label)| serde_json::json!({ "member_id": id, "label": label }))
                    .collect();
                return render_json(&members);
            }
            for (member_id, label) in &members {
                writeln!(out, "{member_id:<20} {label}")?;
            }
        }
    }
    Ok(())
}
