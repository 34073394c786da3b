use std::path::PathBuf;

use cih_contracts::{check, validate, ContractKey, ContractRegistry, Violation};
use serde_json::{json, Map, Value};

fn shipped_registry() -> ContractRegistry {
    // crates/cih-contracts -> repo root
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../contracts");
    ContractRegistry::new(root)
}

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

#[test]
fn scenario_minimal_contract_reports_only_missing_total() {
    let contract = cih_contracts::ContractDocument::from_value(&json!({
        "fields": {"total": {"required": true, "type": "number", "minimum": 0}}
    }))
    .unwrap();

    let errs = validate(&Map::new(), &contract);
    assert_eq!(errs, vec!["Missing required field: total".to_string()]);
}

#[test]
fn scenario_negative_total_breaks_minimum_only() {
    let contract = cih_contracts::ContractDocument::from_value(&json!({
        "fields": {"total": {"required": true, "type": "number", "minimum": 0}}
    }))
    .unwrap();

    let errs = validate(&obj(json!({"total": -10})), &contract);
    assert!(errs.contains(&"Field total must be >= 0".to_string()), "got: {errs:?}");
    assert!(!errs.iter().any(|e| e.starts_with("Missing required field")));
}

#[test]
fn scenario_shipped_order_placed_contract_accepts_well_formed_event() {
    let contract = shipped_registry()
        .load_key(&ContractKey::new("order_placed", 1))
        .unwrap();

    let payload = obj(json!({
        "event_id": "6f1c2d3e-0000-4000-8000-000000000001",
        "customer_id": "b3b1a1f0-0000-4000-8000-000000000002",
        "total": 99.5,
        "timestamp": "2026-03-01T12:00:00Z"
    }));
    assert!(validate(&payload, &contract).is_empty());
}

#[test]
fn scenario_shipped_contract_collects_every_violation_in_field_order() {
    let contract = shipped_registry().load("order_placed_contract_v1").unwrap();

    let payload = obj(json!({"customer_id": 12, "total": "-3"}));
    let got = check(&payload, &contract);
    assert_eq!(
        got,
        vec![
            Violation::MissingRequired { field: "event_id".into() },
            Violation::NotString { field: "customer_id".into() },
            Violation::NotNumber { field: "total".into() },
            Violation::MissingRequired { field: "timestamp".into() },
        ]
    );
}
