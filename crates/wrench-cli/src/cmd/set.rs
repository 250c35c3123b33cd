//! `wr set` — set custom field values on a work item, validated against
//! the work type's schema before anything is written.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use wrench_core::error::ErrorCode;
use wrench_core::fields::validate_fields;
use wrench_core::model::value::CustomFieldValue;
use wrench_core::repo::{AllowAll, AuthorizationGate, WorkRepository, WorkTypes};

use crate::cmd::{fail, parse_field_assignment, Ctx};
use crate::output::render_success;

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Work item id.
    pub id: String,

    /// Custom field assignment, `id=value` (repeatable).
    #[arg(short, long = "field", value_name = "ID=VALUE", required = true)]
    pub field: Vec<String>,

    /// Domain the item belongs to.
    #[arg(short, long, default_value = "ops")]
    pub domain: String,
}

pub fn run_set(args: &SetArgs, ctx: &Ctx) -> Result<()> {
    let resource = format!("{}/{}", args.domain, args.id);
    if !AllowAll.allowed(&ctx.actor, "work:update", &resource) {
        return Err(fail(
            ctx.output,
            ErrorCode::InternalUnexpected,
            format!("actor '{}' may not update {resource}", ctx.actor),
        ));
    }

    let Some(mut work) = ctx.store.find_by_domain_and_id(&args.domain, &args.id)? else {
        return Err(fail(
            ctx.output,
            ErrorCode::WorkNotFound,
            format!("work {resource} not found"),
        ));
    };

    if let Err(err) = ctx.engine.can_update(&work) {
        return Err(fail(ctx.output, ErrorCode::from(&err), err.to_string()));
    }

    let Some(work_type) = ctx.store.find(&work.work_type_id)? else {
        return Err(fail(
            ctx.output,
            ErrorCode::WorkTypeNotFound,
            format!("work type '{}' is not registered", work.work_type_id),
        ));
    };

    // Validate the merged end state, not just the delta, so mandatory
    // coverage holds after the write.
    let mut updates: Vec<(String, CustomFieldValue)> = Vec::new();
    for raw in &args.field {
        updates.push(parse_field_assignment(&work_type, raw)?);
    }
    let mut merged: Vec<(String, CustomFieldValue)> = work
        .custom_fields
        .iter()
        .filter(|(id, _)| !updates.iter().any(|(new_id, _)| new_id == *id))
        .map(|(id, value)| (id.clone(), value.clone()))
        .collect();
    merged.extend(updates.iter().cloned());

    let report = validate_fields(&work_type.attributes, &merged, &ctx.store)?;
    if !report.is_ok() {
        return Err(fail(
            ctx.output,
            ErrorCode::FieldValidationFailed,
            report.to_string(),
        ));
    }

    let now = Utc::now();
    let count = updates.len();
    for (id, value) in updates {
        work.set_field(&id, value, now);
    }
    ctx.store.save(&mut work).map_err(anyhow::Error::from)?;

    render_success(
        ctx.output,
        &format!("Updated {count} field(s) on {}", work.work_id),
    )
}

#[cfg(test)]
mod tests {
    use super::SetArgs;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: SetArgs,
    }

    #[test]
    fn set_args_require_a_field() {
        assert!(Wrapper::try_parse_from(["test", "wr-abc"]).is_err());
        let w = Wrapper::parse_from(["test", "wr-abc", "--field", "quantity=2"]);
        assert_eq!(w.args.field, vec!["quantity=2"]);
    }
}
