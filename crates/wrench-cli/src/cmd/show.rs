//! `wr show` — show one work item in full.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use wrench_core::error::ErrorCode;
use wrench_core::model::state::WorkflowState;
use wrench_core::repo::WorkRepository;

use crate::cmd::{fail, Ctx};
use crate::output::{render_json, text_kv};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Work item id.
    pub id: String,

    /// Domain the item belongs to.
    #[arg(short, long, default_value = "ops")]
    pub domain: String,
}

pub fn run_show(args: &ShowArgs, ctx: &Ctx) -> Result<()> {
    let Some(work) = ctx.store.find_by_domain_and_id(&args.domain, &args.id)? else {
        return Err(fail(
            ctx.output,
            ErrorCode::WorkNotFound,
            format!("work {}/{} not found", args.domain, args.id),
        ));
    };

    let permitted: Vec<WorkflowState> = match ctx.engine.permitted_statuses(&work) {
        Ok(states) => states.into_iter().collect(),
        Err(err) => {
            return Err(fail(ctx.output, ErrorCode::from(&err), err.to_string()));
        }
    };

    if ctx.output.is_json() {
        return render_json(&serde_json::json!({
            "work": work,
            "permitted_statuses": permitted,
        }));
    }

    let mut out = std::io::stdout().lock();
    text_kv(&mut out, "work", format!("{}/{}", work.domain_id, work.work_id))?;
    text_kv(&mut out, "title", &work.title)?;
    text_kv(&mut out, "type", &work.work_type_id)?;
    text_kv(&mut out, "state", work.state().to_string())?;
    if !work.status.comment.is_empty() {
        text_kv(&mut out, "comment", &work.status.comment)?;
    }
    if let Some(parent) = &work.parent_work_id {
        text_kv(&mut out, "parent", parent)?;
    }
    if let Some(description) = &work.description {
        text_kv(&mut out, "description", description)?;
    }
    let permitted_line = if permitted.is_empty() {
        "(none; closed)".to_string()
    } else {
        permitted
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    text_kv(&mut out, "next", permitted_line)?;

    if !work.custom_fields.is_empty() {
        writeln!(out, "fields:")?;
        for (id, value) in &work.custom_fields {
            writeln!(out, "  {id} = {value}")?;
        }
    }
    if !work.status_history.is_empty() {
        writeln!(out, "history:")?;
        for status in &work.status_history {
            writeln!(
                out,
                "  {} at {}{}",
                status.state,
                status.at.to_rfc3339(),
                if status.comment.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", status.comment)
                }
            )?;
        }
    }
    Ok(())
}
