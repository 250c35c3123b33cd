//! `wr move` — request a status transition (or re-evaluate automatic
//! rules when no target is given).

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use std::str::FromStr;

use wrench_core::error::ErrorCode;
use wrench_core::event::{EventProcessor, StatusChangeEvent, TransitionOutcome};
use wrench_core::model::state::WorkflowState;
use wrench_core::propagate::PropagationOutcome;
use wrench_core::repo::{AllowAll, AuthorizationGate};

use crate::cmd::{fail, Ctx};
use crate::output::{render_json, render_success};

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Work item id.
    pub id: String,

    /// Target status. Omit to only re-evaluate automatic rules.
    #[arg(long)]
    pub to: Option<String>,

    /// Domain the item belongs to.
    #[arg(short, long, default_value = "ops")]
    pub domain: String,

    /// Free-text comment recorded with the status.
    #[arg(long)]
    pub comment: Option<String>,
}

pub fn run_move(args: &MoveArgs, ctx: &Ctx) -> Result<()> {
    let resource = format!("{}/{}", args.domain, args.id);
    if !AllowAll.allowed(&ctx.actor, "work:update", &resource) {
        return Err(fail(
            ctx.output,
            ErrorCode::InternalUnexpected,
            format!("actor '{}' may not update {resource}", ctx.actor),
        ));
    }

    let target_state = match &args.to {
        None => None,
        Some(raw) => match WorkflowState::from_str(raw) {
            Ok(state) => Some(state),
            Err(err) => {
                return Err(fail(ctx.output, ErrorCode::IllegalTransition, err.to_string()));
            }
        },
    };

    let event = StatusChangeEvent {
        domain_id: args.domain.clone(),
        work_id: args.id.clone(),
        target_state,
        comment: args.comment.clone(),
    };

    let max_depth = if ctx.config.propagation.auto {
        ctx.config.propagation.max_depth
    } else {
        0
    };
    let processor = EventProcessor::new(&ctx.engine, &ctx.store, ctx.config.retry.policy())
        .with_max_depth(max_depth);

    let report = match processor.process(&event, Utc::now()) {
        Ok(report) => report,
        Err(err) => {
            return Err(fail(ctx.output, ErrorCode::from(&err), err.to_string()));
        }
    };

    let advanced: Vec<String> = report
        .propagations
        .iter()
        .filter_map(|p| match p {
            PropagationOutcome::Advanced { parent_work_id, to } => {
                Some(format!("{parent_work_id} -> {to}"))
            }
            PropagationOutcome::NoParent | PropagationOutcome::NotEligible => None,
        })
        .collect();

    if ctx.output.is_json() {
        let transition = match report.transition {
            TransitionOutcome::Applied(state) => {
                serde_json::json!({ "applied": state })
            }
            TransitionOutcome::AlreadyApplied(state) => {
                serde_json::json!({ "already_applied": state })
            }
            TransitionOutcome::Reevaluated => serde_json::json!("reevaluated"),
        };
        render_json(&serde_json::json!({
            "work_id": args.id,
            "transition": transition,
            "parents_advanced": advanced,
        }))
    } else {
        let mut message = match report.transition {
            TransitionOutcome::Applied(state) => format!("{} moved to {state}", args.id),
            TransitionOutcome::AlreadyApplied(state) => {
                format!("{} already in {state} (event replay)", args.id)
            }
            TransitionOutcome::Reevaluated => format!("{} re-evaluated", args.id),
        };
        for line in &advanced {
            message.push_str(&format!("\nparent advanced: {line}"));
        }
        render_success(ctx.output, &message)
    }
}
