//! Shared fixtures for scenario tests: sample source exports and a throwaway
//! workspace directory laid out the way the `cih` binary expects.

use anyhow::{Context, Result};
use cih_schemas::{CrmCustomerRecord, EcommerceUserRecord, ErpOrderRecord};
use cih_source::InMemorySource;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Smallest complete run: one customer known to both systems, one order
/// referencing the CRM id.
pub fn single_customer_source() -> InMemorySource {
    InMemorySource {
        crm: vec![CrmCustomerRecord::new("1", "a@x.com")],
        ecommerce: vec![EcommerceUserRecord::new("9", "a@x.com")],
        orders: vec![ErpOrderRecord::new("o1", "1", 50.0)],
    }
}

// Normalized policy: Ada and Grace match (Grace only after lower-casing),
// Alan has no email, Edsger is CRM-only, Linus is e-commerce-only.
pub const CRM_CSV: &str = "\
id,name,email,phone
1,Ada Lovelace,ada@example.com,555-0100
2,Grace Hopper,Grace@Example.com,555-0101
3,Alan Turing,,555-0102
4,Edsger Dijkstra,edsger@example.com,
";

pub const ECOMMERCE_CSV: &str = "\
user_id,email_address,signup_channel
u-9,ada@example.com,web
u-10,grace@example.com,app
u-11,linus@example.com,web
";

// o1 via CRM, o2/o3 via e-commerce, o4 dangling ref, o5 no ref.
pub const ORDERS_CSV: &str = "\
order_id,customer_ref,total_amount
o1,1,50
o2,u-10,20.5
o3,u-11,12
o4,999,7
o5,,3
";

pub const ORDER_PLACED_CONTRACT_V1: &str = r#"{
  "fields": {
    "event_id": {"required": true, "type": "string"},
    "customer_id": {"required": true, "type": "string"},
    "total": {"required": true, "type": "number", "minimum": 0},
    "timestamp": {"required": true, "type": "string"}
  }
}
"#;

pub const HUB_CONFIG_YAML: &str = "\
sources:
  crm_customers: data/crm_customers.csv
  ecommerce_users: data/ecommerce_users.csv
  erp_orders: data/erp_orders.csv
master:
  path: out/customers_master.csv
  reuse_prior: true
reconcile:
  email_policy: normalized
  carry_forward_unmatched: true
attribution:
  conflict_policy: prefer_crm
  output: out/orders_attributed.csv
contracts:
  dir: contracts
  order_placed: order_placed_contract_v1
events:
  sink: jsonl
  jsonl_path: out/events.jsonl
exports:
  root: exports
";

/// Temp directory holding sample CSVs, a contract and `config.yaml`. Removed
/// on drop.
pub struct HubWorkspace {
    dir: TempDir,
}

impl HubWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp workspace failed")?;
        let ws = Self { dir };
        ws.write("data/crm_customers.csv", CRM_CSV)?;
        ws.write("data/ecommerce_users.csv", ECOMMERCE_CSV)?;
        ws.write("data/erp_orders.csv", ORDERS_CSV)?;
        ws.write("contracts/order_placed_contract_v1.json", ORDER_PLACED_CONTRACT_V1)?;
        ws.write("config.yaml", HUB_CONFIG_YAML)?;
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write (or overwrite) a file below the root, creating parent dirs.
    pub fn write(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        let p = self.path(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create_dir_all {}", parent.display()))?;
        }
        fs::write(&p, contents).with_context(|| format!("write {}", p.display()))?;
        Ok(p)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path("config.yaml")
    }

    pub fn master_path(&self) -> PathBuf {
        self.path("out/customers_master.csv")
    }

    pub fn attributed_path(&self) -> PathBuf {
        self.path("out/orders_attributed.csv")
    }

    pub fn events_path(&self) -> PathBuf {
        self.path("out/events.jsonl")
    }

    pub fn contracts_dir(&self) -> PathBuf {
        self.path("contracts")
    }

    pub fn exports_root(&self) -> PathBuf {
        self.path("exports")
    }

    /// Manifest paths under `exports/`, one per finished run.
    pub fn manifests(&self) -> Result<Vec<PathBuf>> {
        let root = self.exports_root();
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&root).with_context(|| format!("read_dir {}", root.display()))? {
            let m = entry?.path().join("manifest.json");
            if m.exists() {
                out.push(m);
            }
        }
        out.sort();
        Ok(out)
    }
}

/// Read a CSV file into header->value maps, in file order.
pub fn read_csv_rows(path: &Path) -> Result<Vec<BTreeMap<String, String>>> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("open csv: {}", path.display()))?;
    let headers = rdr.headers().context("read csv headers")?.clone();

    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec.context("read csv record")?;
        let row = headers
            .iter()
            .zip(rec.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        out.push(row);
    }
    Ok(out)
}
