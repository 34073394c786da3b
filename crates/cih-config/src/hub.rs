use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Typed view over the merged config. Every section is optional in YAML and
/// falls back to the defaults below; relative paths are resolved against the
/// config's `base_dir` by [`HubConfig::from_config_json`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub sources: SourcesConfig,
    pub master: MasterConfig,
    pub reconcile: ReconcileConfig,
    pub attribution: AttributionConfig,
    pub contracts: ContractsConfig,
    pub events: EventsConfig,
    pub exports: ExportsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub crm_customers: PathBuf,
    pub ecommerce_users: PathBuf,
    pub erp_orders: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            crm_customers: PathBuf::from("crm_customers.csv"),
            ecommerce_users: PathBuf::from("ecommerce_users.csv"),
            erp_orders: PathBuf::from("erp_orders.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    pub path: PathBuf,
    /// Merge-upsert against the existing master file instead of minting
    /// every id afresh.
    pub reuse_prior: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("customers_master.csv"),
            reuse_prior: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// `exact` or `normalized`.
    pub email_policy: String,
    pub carry_forward_unmatched: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            email_policy: "normalized".to_string(),
            carry_forward_unmatched: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// `prefer_crm` or `reject`.
    pub conflict_policy: String,
    pub output: PathBuf,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            conflict_policy: "prefer_crm".to_string(),
            output: PathBuf::from("orders_attributed.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub dir: PathBuf,
    /// Registry key of the contract `OrderPlaced` events are checked against.
    pub order_placed: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("contracts"),
            order_placed: "order_placed_contract_v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSinkKind {
    #[default]
    Stdout,
    Jsonl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub sink: EventSinkKind,
    pub jsonl_path: PathBuf,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            sink: EventSinkKind::Stdout,
            jsonl_path: PathBuf::from("events.jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportsConfig {
    pub root: PathBuf,
}

impl Default for ExportsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("exports"),
        }
    }
}

impl HubConfig {
    /// Deserialize with defaults, then anchor relative paths at `base_dir`.
    pub fn from_config_json(config_json: &Value, base_dir: &Path) -> Result<Self> {
        let mut cfg: HubConfig = if config_json.is_null() {
            HubConfig::default()
        } else {
            serde_json::from_value(config_json.clone()).context("config does not match hub schema")?
        };

        if cfg.contracts.order_placed.trim().is_empty() {
            bail!("CONFIG_INVALID: /contracts/order_placed must not be empty");
        }

        for p in [
            &mut cfg.sources.crm_customers,
            &mut cfg.sources.ecommerce_users,
            &mut cfg.sources.erp_orders,
            &mut cfg.master.path,
            &mut cfg.attribution.output,
            &mut cfg.contracts.dir,
            &mut cfg.events.jsonl_path,
            &mut cfg.exports.root,
        ] {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        }

        Ok(cfg)
    }
}
