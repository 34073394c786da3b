//! cih-schemas
//!
//! Shared record, identity and event shapes for the customer identity hub.
//!
//! Source-side fields are `Option` throughout: a missing column or a blank cell
//! is carried as `None` rather than rejected. Nothing here performs IO.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Columns a source row carried beyond the ones this workspace interprets.
pub type ExtraFields = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Source records
// ---------------------------------------------------------------------------

/// One row from the CRM customer export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmCustomerRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CrmCustomerRecord {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// One row from the e-commerce user export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcommerceUserRecord {
    pub user_id: Option<String>,
    pub email_address: Option<String>,
    #[serde(default)]
    pub extra: ExtraFields,
}

impl EcommerceUserRecord {
    pub fn new(user_id: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email_address: Some(email_address.into()),
            extra: ExtraFields::new(),
        }
    }
}

/// One row from the ERP order export.
///
/// `customer_ref` is an opaque foreign key: it may name a CRM id or an
/// e-commerce user id, and the attributor has to try both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErpOrderRecord {
    pub order_id: String,
    pub customer_ref: Option<String>,
    pub total_amount: f64,
    #[serde(default)]
    pub extra: ExtraFields,
}

impl ErpOrderRecord {
    pub fn new(order_id: impl Into<String>, customer_ref: impl Into<String>, total_amount: f64) -> Self {
        Self {
            order_id: order_id.into(),
            customer_ref: Some(customer_ref.into()),
            total_amount,
            extra: ExtraFields::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Master identity
// ---------------------------------------------------------------------------

/// One reconciled real-world customer.
///
/// Invariant: at least one of `crm_id`, `ecommerce_id`, `email` is present.
/// `global_id` is assigned once and reused by later runs for the same signals.
/// `name` and `phone` come from the CRM member only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterIdentity {
    pub global_id: Uuid,
    pub crm_id: Option<String>,
    pub ecommerce_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl MasterIdentity {
    /// True when the identity carries at least one identifying signal.
    pub fn has_signal(&self) -> bool {
        [&self.crm_id, &self.ecommerce_id, &self.email]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Attribution output
// ---------------------------------------------------------------------------

/// Which lookup produced an order's global id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionPath {
    Crm,
    Ecommerce,
    Unresolved,
}

impl AttributionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionPath::Crm => "crm",
            AttributionPath::Ecommerce => "ecommerce",
            AttributionPath::Unresolved => "unresolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crm" => Some(AttributionPath::Crm),
            "ecommerce" => Some(AttributionPath::Ecommerce),
            "unresolved" => Some(AttributionPath::Unresolved),
            _ => None,
        }
    }
}

impl fmt::Display for AttributionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ERP order with its customer reference resolved (or not).
///
/// Derived and read-only; never written back into the master set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedOrder {
    pub order_id: String,
    pub global_id: Option<Uuid>,
    pub total_amount: f64,
    pub path: AttributionPath,
    /// E-commerce-path identity that lost to the CRM path, when they differ.
    pub conflicting_global_id: Option<Uuid>,
}

impl AttributedOrder {
    pub fn is_resolved(&self) -> bool {
        self.global_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Domain event emitted when an order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub event_id: Uuid,
    pub customer_id: String,
    pub total: f64,
    pub timestamp: DateTime<Utc>,
}

impl OrderPlacedEvent {
    pub const EVENT_TYPE: &'static str = "OrderPlaced";

    /// New event with a fresh v4 id, stamped now.
    pub fn create(customer_id: impl Into<String>, total: f64) -> Self {
        Self::at(customer_id, total, Utc::now())
    }

    pub fn at(customer_id: impl Into<String>, total: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            customer_id: customer_id.into(),
            total,
            timestamp,
        }
    }

    /// Field map handed to contract validation.
    ///
    /// A non-finite total has no JSON number form and is mapped to `null`, so
    /// a `type: number` rule rejects it.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("event_id".to_string(), Value::String(self.event_id.to_string()));
        m.insert(
            "customer_id".to_string(),
            Value::String(self.customer_id.clone()),
        );
        m.insert(
            "total".to_string(),
            Number::from_f64(self.total)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        m.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        m
    }
}

/// Transport wrapper for emitted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    /// Contract key the payload was validated against.
    pub contract: String,
    pub payload: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identity_without_any_signal_reports_none() {
        let m = MasterIdentity {
            global_id: Uuid::nil(),
            crm_id: None,
            ecommerce_id: Some("  ".to_string()),
            email: None,
            name: Some("Ada".to_string()),
            phone: None,
        };
        assert!(!m.has_signal());
    }

    #[test]
    fn payload_keeps_all_four_fields() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        let ev = OrderPlacedEvent::at("abc", 42.5, ts);
        let p = ev.to_payload();

        assert_eq!(p.len(), 4);
        assert_eq!(p["customer_id"], Value::String("abc".to_string()));
        assert_eq!(p["total"].as_f64(), Some(42.5));
        assert_eq!(p["timestamp"], Value::String("2026-03-01T12:30:05Z".to_string()));
        assert_eq!(p["event_id"], Value::String(ev.event_id.to_string()));
    }

    #[test]
    fn non_finite_total_becomes_null() {
        let ev = OrderPlacedEvent::create("abc", f64::NAN);
        assert_eq!(ev.to_payload()["total"], Value::Null);
    }

    #[test]
    fn attribution_path_parse_round_trips_labels() {
        for p in [
            AttributionPath::Crm,
            AttributionPath::Ecommerce,
            AttributionPath::Unresolved,
        ] {
            assert_eq!(AttributionPath::parse(p.as_str()), Some(p));
        }
        assert_eq!(AttributionPath::parse("erp"), None);
    }
}
