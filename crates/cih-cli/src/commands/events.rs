//! `cih publish-order` and `cih validate`.

use anyhow::{anyhow, bail, Result};
use cih_config::{ConfigCommand, EventSinkKind, UnusedKeyPolicy};
use cih_contracts::{ContractKey, ContractRegistry};
use cih_events::{EventSink, JsonLinesSink, PublishError, Publisher, StdoutSink};
use cih_schemas::OrderPlacedEvent;

use super::{load_hub_config, load_payload};

pub fn publish_order(
    config_paths: &[String],
    policy: UnusedKeyPolicy,
    customer_id: &str,
    total: f64,
) -> Result<()> {
    let (_, hub) = load_hub_config(config_paths, ConfigCommand::PublishOrder, policy)?;
    let registry = ContractRegistry::new(&hub.contracts.dir);
    let key = ContractKey::parse(&hub.contracts.order_placed).ok_or_else(|| {
        anyhow!(
            "CONFIG_INVALID /contracts/order_placed: '{}' is not a <name>_contract_v<n> key",
            hub.contracts.order_placed
        )
    })?;

    let event = match hub.events.sink {
        EventSinkKind::Stdout => publish_with(&registry, &key, StdoutSink, customer_id, total)?,
        EventSinkKind::Jsonl => {
            let sink = JsonLinesSink::new(&hub.events.jsonl_path)?;
            publish_with(&registry, &key, sink, customer_id, total)?
        }
    };

    println!("published=true event_id={}", event.event_id);
    Ok(())
}

fn publish_with<S: EventSink>(
    registry: &ContractRegistry,
    key: &ContractKey,
    sink: S,
    customer_id: &str,
    total: f64,
) -> Result<OrderPlacedEvent> {
    let mut publisher = Publisher::from_registry(registry, key, sink)?;
    match publisher.publish_order(customer_id, total) {
        Ok(ev) => Ok(ev),
        Err(PublishError::ContractViolation(v)) => {
            println!("published=false");
            for msg in v.messages() {
                println!("error={msg}");
            }
            Err(PublishError::ContractViolation(v).into())
        }
        Err(other) => Err(other.into()),
    }
}

pub fn validate(
    config_paths: &[String],
    policy: UnusedKeyPolicy,
    contract: &str,
    payload: Option<String>,
    payload_file: Option<String>,
) -> Result<()> {
    let (_, hub) = load_hub_config(config_paths, ConfigCommand::Validate, policy)?;
    let doc = ContractRegistry::new(&hub.contracts.dir).load(contract)?;

    let payload = load_payload(payload, payload_file)?;
    let Some(obj) = payload.as_object() else {
        bail!("payload must be a JSON object");
    };

    let errors = cih_contracts::validate(obj, &doc);
    if errors.is_empty() {
        println!("valid=true contract={contract}");
        return Ok(());
    }

    println!("valid=false contract={contract} errors={}", errors.len());
    for e in &errors {
        println!("error={e}");
    }
    bail!("CONTRACT_VIOLATION: {} error(s) against {contract}", errors.len())
}
