//! `wr types` — list registered work types and their schemas.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use crate::cmd::Ctx;
use crate::output::render_json;

#[derive(Args, Debug)]
pub struct TypesArgs {}

pub fn run_types(_args: &TypesArgs, ctx: &Ctx) -> Result<()> {
    let types = ctx.store.list_work_types()?;

    if ctx.output.is_json() {
        return render_json(&types);
    }

    let mut out = std::io::stdout().lock();
    for work_type in &types {
        writeln!(out, "{} ({}) — {}", work_type.id, work_type.variant, work_type.title)?;
        for attr in &work_type.attributes {
            let mandatory = if attr.mandatory { " [mandatory]" } else { "" };
            let lov = attr
                .lov_ref
                .as_deref()
                .map(|catalog| format!(" <- {catalog}"))
                .unwrap_or_default();
            writeln!(out, "  {:<18} {}{}{}", attr.id, attr.kind, mandatory, lov)?;
        }
    }
    Ok(())
}
