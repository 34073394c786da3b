use std::fmt;
use std::str::FromStr;

use cih_schemas::MasterIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an email cell becomes a reconciliation key.
///
/// Blank or whitespace-only emails yield no key under either policy,
/// `Exact` included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailPolicy {
    /// Case-sensitive comparison of the value as received. File sources
    /// trim every cell on read, so surrounding whitespace never reaches
    /// this policy from CSV input.
    Exact,
    /// Trimmed and lower-cased before comparison.
    #[default]
    Normalized,
}

impl EmailPolicy {
    pub fn key(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?;
        if raw.trim().is_empty() {
            return None;
        }
        match self {
            EmailPolicy::Exact => Some(raw.to_string()),
            EmailPolicy::Normalized => Some(raw.trim().to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailPolicy::Exact => "exact",
            EmailPolicy::Normalized => "normalized",
        }
    }
}

impl FromStr for EmailPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(EmailPolicy::Exact),
            "normalized" => Ok(EmailPolicy::Normalized),
            other => Err(format!(
                "invalid email policy '{other}'. expected one of: exact | normalized"
            )),
        }
    }
}

/// Knobs for one reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub email_policy: EmailPolicy,
    /// Keep prior identities whose signals no longer appear in either source.
    pub carry_forward_unmatched: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            email_policy: EmailPolicy::Normalized,
            carry_forward_unmatched: true,
        }
    }
}

impl ReconcileOptions {
    pub fn exact() -> Self {
        Self {
            email_policy: EmailPolicy::Exact,
            ..Self::default()
        }
    }
}

/// Which source system a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSide {
    Crm,
    Ecommerce,
}

impl fmt::Display for SourceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSide::Crm => f.write_str("crm"),
            SourceSide::Ecommerce => f.write_str("ecommerce"),
        }
    }
}

/// Observations worth auditing. None of these stop a run.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileDiff {
    /// Record carried neither an id nor an email; not materialized.
    NoSignal { side: SourceSide, index: usize },

    /// A second record on the same side shares an already-grouped email key.
    /// The first record's id is kept on the identity.
    DuplicateKey {
        side: SourceSide,
        record_id: Option<String>,
        email_key: String,
    },

    /// crm id and e-commerce id point at different prior identities.
    /// The crm-side identity is kept.
    PriorConflict {
        crm_id: String,
        ecommerce_id: String,
        kept: Uuid,
        other: Uuid,
    },

    /// The group matched a prior identity that another group already claimed.
    SplitFromPrior { previous: Uuid, assigned: Uuid },

    /// Prior identity whose signals were all taken over by current identities.
    Superseded { global_id: Uuid },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub crm_records: usize,
    pub ecommerce_records: usize,
    pub matched: usize,
    pub crm_only: usize,
    pub ecommerce_only: usize,
    pub reused_ids: usize,
    pub fresh_ids: usize,
    pub carried_forward: usize,
    pub superseded: usize,
    pub no_signal: usize,
    pub duplicate_keys: usize,
}

/// Output of a reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Current identities in first-appearance order, then carried-forward ones.
    pub identities: Vec<MasterIdentity>,
    pub stats: ReconcileStats,
    /// Sorted for stable output.
    pub diffs: Vec<ReconcileDiff>,
}

impl ReconcileReport {
    pub fn identity_for_crm(&self, crm_id: &str) -> Option<&MasterIdentity> {
        self.identities
            .iter()
            .find(|m| m.crm_id.as_deref() == Some(crm_id))
    }

    pub fn identity_for_ecommerce(&self, user_id: &str) -> Option<&MasterIdentity> {
        self.identities
            .iter()
            .find(|m| m.ecommerce_id.as_deref() == Some(user_id))
    }
}
