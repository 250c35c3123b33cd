//! `wr create` — create a new work item.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use uuid::Uuid;

use wrench_core::error::ErrorCode;
use wrench_core::fields::validate_fields;
use wrench_core::model::value::{CustomFieldValue, ValueKind};
use wrench_core::model::work::WorkItem;
use wrench_core::repo::{AllowAll, AuthorizationGate, WorkRepository, WorkTypes};

use crate::cmd::{fail, parse_field_assignment, Ctx};
use crate::output::{render_json, render_success};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Work type id (see `wr types`).
    #[arg(short = 't', long = "type")]
    pub work_type: String,

    /// Title of the new item.
    #[arg(long)]
    pub title: String,

    /// Domain the item belongs to.
    #[arg(short, long, default_value = "ops")]
    pub domain: String,

    /// Parent work item id (makes this a child).
    #[arg(long)]
    pub parent: Option<String>,

    /// Description text.
    #[arg(long)]
    pub description: Option<String>,

    /// Custom field assignment, `id=value` (repeatable).
    #[arg(short, long = "field", value_name = "ID=VALUE")]
    pub field: Vec<String>,
}

pub fn run_create(args: &CreateArgs, ctx: &Ctx) -> Result<()> {
    let resource = format!("{}/*", args.domain);
    if !AllowAll.allowed(&ctx.actor, "work:create", &resource) {
        return Err(fail(
            ctx.output,
            ErrorCode::InternalUnexpected,
            format!("actor '{}' may not create work in {}", ctx.actor, args.domain),
        ));
    }

    let Some(work_type) = ctx.store.find(&args.work_type)? else {
        return Err(fail(
            ctx.output,
            ErrorCode::WorkTypeNotFound,
            format!("work type '{}' is not registered", args.work_type),
        ));
    };
    let variant = match ctx.engine.variant_of(&work_type) {
        Ok(variant) => variant,
        Err(err) => {
            return Err(fail(ctx.output, ErrorCode::from(&err), err.to_string()));
        }
    };

    // A child may only be attached while the parent's variant allows it.
    if let Some(parent_id) = &args.parent {
        let Some(parent) = ctx.store.find_by_domain_and_id(&args.domain, parent_id)? else {
            return Err(fail(
                ctx.output,
                ErrorCode::ParentNotFound,
                format!("parent {}/{} not found", args.domain, parent_id),
            ));
        };
        match ctx.engine.can_create_child(&parent) {
            Ok(true) => {}
            Ok(false) => {
                return Err(fail(
                    ctx.output,
                    ErrorCode::WorkCompleted,
                    format!(
                        "parent {} does not accept new children in state {}",
                        parent_id,
                        parent.state()
                    ),
                ));
            }
            Err(err) => {
                return Err(fail(ctx.output, ErrorCode::from(&err), err.to_string()));
            }
        }
    }

    let mut values: Vec<(String, CustomFieldValue)> = Vec::new();
    for raw in &args.field {
        values.push(parse_field_assignment(&work_type, raw)?);
    }
    backfill_intrinsics(&work_type, args, &mut values);

    let report = validate_fields(&work_type.attributes, &values, &ctx.store)?;
    if !report.is_ok() {
        return Err(fail(
            ctx.output,
            ErrorCode::FieldValidationFailed,
            report.to_string(),
        ));
    }

    let now = Utc::now();
    let work_id = mint_work_id();
    let mut work = WorkItem::new(
        &args.domain,
        &work_id,
        &work_type.id,
        &args.title,
        variant.initial(),
        now,
    );
    work.parent_work_id = args.parent.clone();
    work.description = args.description.clone();
    for (id, value) in values {
        work.set_field(&id, value, now);
    }
    ctx.store.save(&mut work).map_err(anyhow::Error::from)?;

    if ctx.output.is_json() {
        render_json(&serde_json::json!({
            "domain_id": work.domain_id,
            "work_id": work.work_id,
            "state": work.state(),
        }))
    } else {
        render_success(
            ctx.output,
            &format!("Created {} ({}) in state {}", work.work_id, work.title, work.state()),
        )
    }
}

/// Mirror the intrinsic title/description into same-named schema fields
/// when the schema declares them and no explicit assignment was given.
fn backfill_intrinsics(
    work_type: &wrench_core::model::work_type::WorkType,
    args: &CreateArgs,
    values: &mut Vec<(String, CustomFieldValue)>,
) {
    let has = |values: &[(String, CustomFieldValue)], id: &str| {
        values.iter().any(|(existing, _)| existing == id)
    };
    if let Some(attr) = work_type.attribute("title") {
        if attr.kind == ValueKind::String && !has(values, "title") {
            values.push(("title".into(), CustomFieldValue::String(args.title.clone())));
        }
    }
    if let Some(attr) = work_type.attribute("description") {
        if attr.kind == ValueKind::String && !has(values, "description") {
            if let Some(description) = &args.description {
                values.push((
                    "description".into(),
                    CustomFieldValue::String(description.clone()),
                ));
            }
        }
    }
}

fn mint_work_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("wr-{}", &raw[..8])
}

#[cfg(test)]
mod tests {
    use super::mint_work_id;

    #[test]
    fn minted_ids_are_prefixed_and_short() {
        let id = mint_work_id();
        assert!(id.starts_with("wr-"));
        assert_eq!(id.len(), 11);
    }

    #[test]
    fn minted_ids_are_unique_enough() {
        let a = mint_work_id();
        let b = mint_work_id();
        assert_ne!(a, b);
    }

    #[test]
    fn create_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: super::CreateArgs,
        }
        let w = Wrapper::parse_from([
            "test",
            "--type",
            "hardware_request",
            "--title",
            "Spare klystron",
            "--field",
            "quantity=2",
        ]);
        assert_eq!(w.args.work_type, "hardware_request");
        assert_eq!(w.args.domain, "ops");
        assert_eq!(w.args.field, vec!["quantity=2"]);
    }
}
