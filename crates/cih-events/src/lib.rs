//! cih-events
//!
//! Contract-gated publishing of domain events. An event is built, turned into
//! a field map, checked against its contract, and handed to an [`EventSink`]
//! only when the check comes back clean.

use std::fmt;

use cih_contracts::{
    check, ContractDocument, ContractKey, ContractLoadError, ContractRegistry, ValidationErrors,
};
use cih_schemas::{EventEnvelope, OrderPlacedEvent};
use serde_json::{Map, Value};
use tracing::{info, warn};

mod sink;

pub use sink::{read_envelopes, EventSink, JsonLinesSink, MemorySink, StdoutSink};

/// Envelope type every sink receives.
pub type PayloadEnvelope = EventEnvelope<Map<String, Value>>;

pub const ORDERS_TOPIC: &str = "orders";

#[derive(Debug)]
pub enum PublishError {
    /// Payload broke its contract; nothing was emitted.
    ContractViolation(ValidationErrors),
    /// Contract could not be loaded.
    Contract(ContractLoadError),
    /// Sink refused the envelope.
    Sink(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::ContractViolation(v) => write!(f, "{v}"),
            PublishError::Contract(e) => write!(f, "{e}"),
            PublishError::Sink(reason) => write!(f, "event sink failed: {reason}"),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::ContractViolation(v) => Some(v),
            PublishError::Contract(e) => Some(e),
            PublishError::Sink(_) => None,
        }
    }
}

impl From<ContractLoadError> for PublishError {
    fn from(e: ContractLoadError) -> Self {
        PublishError::Contract(e)
    }
}

/// Publishes `OrderPlaced` events through one contract into one sink.
pub struct Publisher<S: EventSink> {
    contract_key: String,
    contract: ContractDocument,
    sink: S,
}

impl<S: EventSink> Publisher<S> {
    pub fn new(contract_key: impl Into<String>, contract: ContractDocument, sink: S) -> Self {
        Self {
            contract_key: contract_key.into(),
            contract,
            sink,
        }
    }

    /// Load `key` from the registry once; every later publish reuses it.
    pub fn from_registry(
        registry: &ContractRegistry,
        key: &ContractKey,
        sink: S,
    ) -> Result<Self, PublishError> {
        let contract = registry.load_key(key)?;
        Ok(Self::new(key.to_string(), contract, sink))
    }

    pub fn contract_key(&self) -> &str {
        &self.contract_key
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Build an `OrderPlaced` event stamped now and publish it.
    pub fn publish_order(
        &mut self,
        customer_id: &str,
        total: f64,
    ) -> Result<OrderPlacedEvent, PublishError> {
        self.publish_event(OrderPlacedEvent::create(customer_id, total))
    }

    /// Validate then emit. On any violation the sink is not touched.
    pub fn publish_event(
        &mut self,
        event: OrderPlacedEvent,
    ) -> Result<OrderPlacedEvent, PublishError> {
        let payload = event.to_payload();

        let violations = check(&payload, &self.contract);
        if !violations.is_empty() {
            let errs = ValidationErrors {
                contract: self.contract_key.clone(),
                violations,
            };
            warn!(
                event_id = %event.event_id,
                contract = %self.contract_key,
                errors = %errs.messages().join("; "),
                "event rejected by contract"
            );
            return Err(PublishError::ContractViolation(errs));
        }

        let envelope = EventEnvelope {
            event_id: event.event_id,
            ts_utc: event.timestamp,
            topic: ORDERS_TOPIC.to_string(),
            event_type: OrderPlacedEvent::EVENT_TYPE.to_string(),
            contract: self.contract_key.clone(),
            payload,
        };

        self.sink
            .emit(&envelope)
            .map_err(|e| PublishError::Sink(format!("{e:#}")))?;

        info!(
            event_id = %event.event_id,
            customer_id = %event.customer_id,
            total = event.total,
            "event published"
        );
        Ok(event)
    }
}
