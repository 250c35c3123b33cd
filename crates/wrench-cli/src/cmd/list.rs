//! `wr list` — list work items with optional filters.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::str::FromStr;

use wrench_core::error::ErrorCode;
use wrench_core::model::state::WorkflowState;

use crate::cmd::{fail, Ctx};
use crate::output::render_json;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only items in this domain.
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Only items in this state.
    #[arg(short, long)]
    pub state: Option<String>,
}

pub fn run_list(args: &ListArgs, ctx: &Ctx) -> Result<()> {
    let state = match &args.state {
        None => None,
        Some(raw) => match WorkflowState::from_str(raw) {
            Ok(state) => Some(state),
            Err(err) => {
                return Err(fail(ctx.output, ErrorCode::IllegalTransition, err.to_string()));
            }
        },
    };

    let items = ctx.store.list_work(args.domain.as_deref(), state)?;

    if ctx.output.is_json() {
        return render_json(&items);
    }

    let mut out = std::io::stdout().lock();
    for work in &items {
        writeln!(
            out,
            "{:<12} {:<10} {:<18} {}",
            work.work_id,
            work.domain_id,
            work.state().to_string(),
            work.title
        )?;
    }
    writeln!(out, "{} item(s)", items.len())?;
    Ok(())
}
