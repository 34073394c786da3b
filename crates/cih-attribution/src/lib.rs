//! cih-attribution
//!
//! Resolves an ERP order's opaque `customer_ref` to a master global id.
//!
//! Two independent lookups run against an immutable master snapshot:
//! - `crm_id == customer_ref`
//! - `ecommerce_id == customer_ref`
//!
//! The CRM path always wins when both resolve. What happens when they resolve
//! to *different* identities is a [`ConflictPolicy`] decision.
//!
//! Pure: no IO, no mutation of the master set.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use cih_schemas::{AttributedOrder, AttributionPath, ErpOrderRecord, MasterIdentity};
use tracing::{debug, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Policy + errors
// ---------------------------------------------------------------------------

/// What to do when the CRM path and e-commerce path disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the CRM-path identity; report the other as `conflicting_global_id`.
    #[default]
    PreferCrm,
    /// Refuse to attribute the order.
    Reject,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefer_crm" => Ok(ConflictPolicy::PreferCrm),
            "reject" => Ok(ConflictPolicy::Reject),
            other => Err(format!(
                "invalid conflict policy '{other}'. expected one of: prefer_crm | reject"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributionError {
    /// Both lookup paths resolved, to different identities, under
    /// [`ConflictPolicy::Reject`].
    Conflict {
        order_id: String,
        customer_ref: String,
        crm_global_id: Uuid,
        ecommerce_global_id: Uuid,
    },
}

impl fmt::Display for AttributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributionError::Conflict {
                order_id,
                customer_ref,
                crm_global_id,
                ecommerce_global_id,
            } => write!(
                f,
                "order '{order_id}': customer_ref '{customer_ref}' resolves to crm identity \
                 {crm_global_id} and ecommerce identity {ecommerce_global_id}"
            ),
        }
    }
}

impl std::error::Error for AttributionError {}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Read-only lookup tables over a master snapshot.
///
/// Built once per run and shared by reference; `Sync`, so independent orders
/// can be attributed from several threads. When two identities carry the same
/// id, the first one in the master set wins.
#[derive(Debug)]
pub struct MasterIndex<'a> {
    by_crm: HashMap<&'a str, &'a MasterIdentity>,
    by_ecom: HashMap<&'a str, &'a MasterIdentity>,
}

impl<'a> MasterIndex<'a> {
    pub fn build(master: &'a [MasterIdentity]) -> Self {
        let mut by_crm = HashMap::new();
        let mut by_ecom = HashMap::new();
        for m in master {
            if let Some(id) = m.crm_id.as_deref() {
                by_crm.entry(id).or_insert(m);
            }
            if let Some(id) = m.ecommerce_id.as_deref() {
                by_ecom.entry(id).or_insert(m);
            }
        }
        Self { by_crm, by_ecom }
    }

    pub fn by_crm_id(&self, id: &str) -> Option<&'a MasterIdentity> {
        self.by_crm.get(id).copied()
    }

    pub fn by_ecommerce_id(&self, id: &str) -> Option<&'a MasterIdentity> {
        self.by_ecom.get(id).copied()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Attribute one order.
///
/// No match on either path is a valid outcome (`global_id = None`), not an
/// error. Only a rejected conflict returns `Err`.
pub fn attribute(
    order: &ErpOrderRecord,
    index: &MasterIndex<'_>,
    policy: ConflictPolicy,
) -> Result<AttributedOrder, AttributionError> {
    let unresolved = || AttributedOrder {
        order_id: order.order_id.clone(),
        global_id: None,
        total_amount: order.total_amount,
        path: AttributionPath::Unresolved,
        conflicting_global_id: None,
    };

    let Some(customer_ref) = order.customer_ref.as_deref() else {
        return Ok(unresolved());
    };

    let via_crm = index.by_crm_id(customer_ref).map(|m| m.global_id);
    let via_ecom = index.by_ecommerce_id(customer_ref).map(|m| m.global_id);

    let (global_id, path, conflicting_global_id) = match (via_crm, via_ecom) {
        (Some(a), Some(b)) if a != b => {
            if policy == ConflictPolicy::Reject {
                return Err(AttributionError::Conflict {
                    order_id: order.order_id.clone(),
                    customer_ref: customer_ref.to_string(),
                    crm_global_id: a,
                    ecommerce_global_id: b,
                });
            }
            warn!(
                order_id = %order.order_id,
                customer_ref,
                crm_global_id = %a,
                ecommerce_global_id = %b,
                "customer_ref resolves on both paths to different identities; crm path kept"
            );
            (a, AttributionPath::Crm, Some(b))
        }
        (Some(a), _) => (a, AttributionPath::Crm, None),
        (None, Some(b)) => (b, AttributionPath::Ecommerce, None),
        (None, None) => return Ok(unresolved()),
    };

    Ok(AttributedOrder {
        order_id: order.order_id.clone(),
        global_id: Some(global_id),
        total_amount: order.total_amount,
        path,
        conflicting_global_id,
    })
}

/// Attribution of a whole order batch.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributionReport {
    /// Same order as the input.
    pub orders: Vec<AttributedOrder>,
    pub resolved_via_crm: usize,
    pub resolved_via_ecommerce: usize,
    pub unresolved: usize,
    pub conflicts: usize,
}

impl AttributionReport {
    pub fn unresolved_orders(&self) -> impl Iterator<Item = &AttributedOrder> {
        self.orders.iter().filter(|o| !o.is_resolved())
    }
}

/// Attribute every order against `master`. Stops at the first rejected conflict.
pub fn attribute_all(
    orders: &[ErpOrderRecord],
    master: &[MasterIdentity],
    policy: ConflictPolicy,
) -> Result<AttributionReport, AttributionError> {
    let index = MasterIndex::build(master);

    let mut report = AttributionReport {
        orders: Vec::with_capacity(orders.len()),
        resolved_via_crm: 0,
        resolved_via_ecommerce: 0,
        unresolved: 0,
        conflicts: 0,
    };

    for order in orders {
        let a = attribute(order, &index, policy)?;
        match a.path {
            AttributionPath::Crm => report.resolved_via_crm += 1,
            AttributionPath::Ecommerce => report.resolved_via_ecommerce += 1,
            AttributionPath::Unresolved => report.unresolved += 1,
        }
        if a.conflicting_global_id.is_some() {
            report.conflicts += 1;
        }
        report.orders.push(a);
    }

    debug!(
        orders = report.orders.len(),
        via_crm = report.resolved_via_crm,
        via_ecommerce = report.resolved_via_ecommerce,
        unresolved = report.unresolved,
        conflicts = report.conflicts,
        "attribution pass complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(n: u128, crm: Option<&str>, ecom: Option<&str>) -> MasterIdentity {
        MasterIdentity {
            global_id: Uuid::from_u128(n),
            crm_id: crm.map(str::to_string),
            ecommerce_id: ecom.map(str::to_string),
            email: None,
            name: None,
            phone: None,
        }
    }

    #[test]
    fn first_identity_wins_on_duplicate_ids() {
        let master = vec![identity(1, Some("X"), None), identity(2, Some("X"), None)];
        let idx = MasterIndex::build(&master);
        assert_eq!(idx.by_crm_id("X").unwrap().global_id, Uuid::from_u128(1));
    }

    #[test]
    fn order_without_reference_is_unresolved() {
        let master = vec![identity(1, Some("X"), None)];
        let idx = MasterIndex::build(&master);
        let order = ErpOrderRecord {
            customer_ref: None,
            ..ErpOrderRecord::new("o1", "", 10.0)
        };
        let a = attribute(&order, &idx, ConflictPolicy::PreferCrm).unwrap();
        assert_eq!(a.global_id, None);
        assert_eq!(a.path, AttributionPath::Unresolved);
        assert_eq!(a.total_amount, 10.0);
    }

    #[test]
    fn both_paths_on_same_identity_is_not_a_conflict() {
        let master = vec![identity(1, Some("X"), Some("X"))];
        let idx = MasterIndex::build(&master);
        let a = attribute(&ErpOrderRecord::new("o1", "X", 1.0), &idx, ConflictPolicy::Reject).unwrap();
        assert_eq!(a.global_id, Some(Uuid::from_u128(1)));
        assert_eq!(a.path, AttributionPath::Crm);
        assert_eq!(a.conflicting_global_id, None);
    }

    #[test]
    fn conflict_policy_parses_config_strings() {
        assert_eq!("prefer_crm".parse::<ConflictPolicy>(), Ok(ConflictPolicy::PreferCrm));
        assert_eq!("REJECT".parse::<ConflictPolicy>(), Ok(ConflictPolicy::Reject));
        assert!("first".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn conflict_error_names_both_identities() {
        let e = AttributionError::Conflict {
            order_id: "o1".to_string(),
            customer_ref: "X".to_string(),
            crm_global_id: Uuid::from_u128(1),
            ecommerce_global_id: Uuid::from_u128(2),
        };
        let s = e.to_string();
        assert!(s.contains("o1"));
        assert!(s.contains(&Uuid::from_u128(1).to_string()));
        assert!(s.contains(&Uuid::from_u128(2).to_string()));
    }
}
