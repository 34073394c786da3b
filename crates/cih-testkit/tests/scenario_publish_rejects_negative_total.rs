//! Only events that satisfy the shipped OrderPlaced contract reach the log.

use anyhow::Result;
use cih_contracts::{ContractKey, ContractRegistry};
use cih_events::{read_envelopes, JsonLinesSink, PublishError, Publisher};
use cih_testkit::HubWorkspace;

#[test]
fn negative_total_never_reaches_event_log() -> Result<()> {
    let ws = HubWorkspace::new()?;
    let registry = ContractRegistry::new(ws.contracts_dir());
    let sink = JsonLinesSink::new(ws.events_path())?;
    let mut publisher = Publisher::from_registry(&registry, &ContractKey::new("order_placed", 1), sink)?;

    let v = match publisher.publish_order("cust-1", -10.0) {
        Err(PublishError::ContractViolation(v)) => v,
        Err(other) => panic!("expected contract violation, got {other}"),
        Ok(ev) => panic!("negative total was published: {}", ev.event_id),
    };
    assert_eq!(v.messages(), vec!["Field total must be >= 0".to_string()]);
    assert!(!ws.events_path().exists(), "rejected event must not create the log");

    let ok = publisher.publish_order("cust-1", 10.0)?;
    let logged = read_envelopes(ws.events_path())?;
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].event_id, ok.event_id);
    assert_eq!(logged[0].payload["total"], serde_json::json!(10.0));
    Ok(())
}
