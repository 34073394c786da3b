//! cih-config
//!
//! Layered YAML configuration. Documents merge in order (later overrides
//! earlier), the result is held as JSON, and `config_hash` is the sha256 of
//! its canonical (key-sorted, compact) form so a run can be tied to the exact
//! settings it used.

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

mod consumption;
mod hub;

pub use consumption::{
    consumed_pointers_for_command, report_unused_keys, ConfigCommand, UnusedKeyPolicy,
    UnusedKeyReport,
};
pub use hub::{
    AttributionConfig, ContractsConfig, EventSinkKind, EventsConfig, ExportsConfig, HubConfig,
    MasterConfig, ReconcileConfig, SourcesConfig,
};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    /// Directory of the first layer; relative paths in the config resolve here.
    pub base_dir: PathBuf,
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p)
            .with_context(|| format!("failed to read yaml path: {}", p.display()))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    let mut loaded = load_layered_yaml_from_strings(&doc_refs)?;

    if let Some(parent) = paths.first().and_then(|p| p.as_ref().parent()) {
        loaded.base_dir = parent.to_path_buf();
    }
    Ok(loaded)
}

/// Merge in-memory YAML documents. `base_dir` is left as `.`.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses as null; treat it as "no overrides".
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
        base_dir: PathBuf::from("."),
    })
}

pub fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sort_keys(v)).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
