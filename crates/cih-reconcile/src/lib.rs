//! cih-reconcile
//!
//! Identity reconciliation: merges CRM and e-commerce customer records into
//! master identities, keyed on email.
//!
//! - Full outer join on the email key; records without an email stay alone.
//! - Key derivation is an explicit [`EmailPolicy`] (exact or normalized).
//! - Against a prior master set, global ids are reused by signal
//!   (crm id, then e-commerce id, then email) instead of regenerated.
//! - Unmatched records are represented as absent fields, never as errors.
//!
//! Deterministic given a deterministic [`GlobalIdSource`]. No IO.

mod compare;
mod engine;
mod ids;
mod types;

pub use compare::{compare_sources, ComparisonRow, ComparisonSide, ComparisonSummary, SourceComparison};
pub use engine::{reconcile, reconcile_with_ids, reconcile_with_prior};
pub use ids::{GlobalIdSource, RandomIds, SeededIds};
pub use types::*;
