//! End-to-end lifecycle tests across the engine, validator, and store.

use chrono::{TimeZone, Utc};
use wrench_core::db::Store;
use wrench_core::fields::validate_fields;
use wrench_core::model::state::WorkflowState;
use wrench_core::model::value::CustomFieldValue;
use wrench_core::model::work::WorkItem;
use wrench_core::repo::{WorkRepository, WorkTypes};
use wrench_core::workflow::engine::{EngineError, WorkflowEngine};
use wrench_core::workflow::VariantSet;

fn t(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn store() -> Store {
    let store = Store::open_in_memory().expect("open store");
    store.seed_builtin().expect("seed");
    store
}

fn engine(store: Store) -> WorkflowEngine<Store> {
    WorkflowEngine::new(VariantSet::builtin().expect("variants"), store)
}

#[test]
fn record_walks_submitted_to_closed_with_history() {
    let engine = engine(store());
    let mut work = WorkItem::new(
        "accel",
        "wr-1",
        "activity_record",
        "Log beam fault",
        WorkflowState::Submitted,
        t(0),
    );

    engine
        .request_transition(&mut work, Some(WorkflowState::Approved), "ok", t(10))
        .unwrap();
    assert_eq!(
        work.status_history.iter().map(|s| s.state).collect::<Vec<_>>(),
        vec![WorkflowState::Submitted]
    );

    engine
        .request_transition(&mut work, Some(WorkflowState::InProgress), "", t(20))
        .unwrap();
    assert_eq!(
        work.status_history.iter().map(|s| s.state).collect::<Vec<_>>(),
        vec![WorkflowState::Submitted, WorkflowState::Approved]
    );

    // Closing from Approved directly is not a legal edge.
    let mut detour = work.clone();
    detour.status.state = WorkflowState::Approved;
    assert!(matches!(
        engine.request_transition(&mut detour, Some(WorkflowState::Closed), "", t(30)),
        Err(EngineError::IllegalTransition { .. })
    ));

    engine
        .request_transition(&mut work, Some(WorkflowState::Closed), "done", t(30))
        .unwrap();
    assert!(engine.is_completed(&work));
    assert!(engine.permitted_statuses(&work).unwrap().is_empty());
}

#[test]
fn closed_item_survives_a_store_roundtrip_still_closed() {
    let store = store();
    let mut work = WorkItem::new(
        "accel",
        "wr-1",
        "activity_record",
        "Log beam fault",
        WorkflowState::Submitted,
        t(0),
    );
    store.save(&mut work).unwrap();

    let engine = engine(self::store());
    for target in [
        WorkflowState::Approved,
        WorkflowState::InProgress,
        WorkflowState::Closed,
    ] {
        engine
            .request_transition(&mut work, Some(target), "", t(10))
            .unwrap();
    }
    store.save(&mut work).unwrap();

    let loaded = store.find_by_domain_and_id("accel", "wr-1").unwrap().unwrap();
    assert!(loaded.is_closed());
    assert_eq!(loaded.status_history.len(), 3);

    let mut loaded = loaded;
    assert!(matches!(
        engine.request_transition(&mut loaded, Some(WorkflowState::Submitted), "", t(50)),
        Err(EngineError::WorkCompleted { .. })
    ));
}

#[test]
fn create_update_flow_validates_before_saving() {
    let store = store();
    let engine = engine(self::store());

    let work_type = store.find("hardware_request").unwrap().unwrap();
    let variant = engine.variant_of(&work_type).unwrap();
    let mut work = WorkItem::new(
        "accel",
        "wr-1",
        "hardware_request",
        "Spare klystron",
        variant.initial(),
        t(0),
    );

    // Reject the bad batch outright: nothing is written.
    let values = vec![
        ("title".to_string(), CustomFieldValue::String("Spare klystron".into())),
        ("quantity".to_string(), CustomFieldValue::String("two".into())),
    ];
    let report = validate_fields(&work_type.attributes, &values, &store).unwrap();
    assert!(!report.is_ok());

    let values = vec![
        ("title".to_string(), CustomFieldValue::String("Spare klystron".into())),
        ("quantity".to_string(), CustomFieldValue::Number(2)),
        (
            "shop_group".to_string(),
            CustomFieldValue::Lov("rf_shop".into()),
        ),
    ];
    let report = validate_fields(&work_type.attributes, &values, &store).unwrap();
    assert!(report.is_ok());

    engine.can_update(&work).unwrap();
    for (id, value) in values {
        work.set_field(&id, value, t(5));
    }
    store.save(&mut work).unwrap();

    let loaded = store.find_by_domain_and_id("accel", "wr-1").unwrap().unwrap();
    assert_eq!(loaded.custom_fields.len(), 3);
}
