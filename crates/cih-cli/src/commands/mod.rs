//! Command handlers for the `cih` binary.
//!
//! Shared config and payload helpers live here; each submodule owns one
//! family of commands.

pub mod events;
pub mod pipeline;

use anyhow::{Context, Result};
use cih_config::{ConfigCommand, HubConfig, LoadedConfig, UnusedKeyPolicy};
use serde_json::Value;
use std::fs;
use tracing::warn;

/// Load layered config, run the unused-key guard for `command`, and build the
/// typed view.
pub fn load_hub_config(
    paths: &[String],
    command: ConfigCommand,
    policy: UnusedKeyPolicy,
) -> Result<(LoadedConfig, HubConfig)> {
    let loaded = cih_config::load_layered_yaml(paths)?;

    let report = cih_config::report_unused_keys(command, &loaded.config_json, policy)?;
    for ptr in &report.unused_leaf_pointers {
        warn!(command = command.as_str(), key = %ptr, "config key not read by this command");
    }

    let hub = HubConfig::from_config_json(&loaded.config_json, &loaded.base_dir)?;
    Ok((loaded, hub))
}

/// Payload from either an inline JSON string or a file path.
pub fn load_payload(payload: Option<String>, payload_file: Option<String>) -> Result<Value> {
    if let Some(p) = payload_file {
        let bytes = fs::read(&p).with_context(|| format!("read payload-file failed: {}", p))?;
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
        let raw = String::from_utf8(bytes.to_vec()).context("payload-file must be UTF-8 text")?;
        let v: Value =
            serde_json::from_str(raw.trim()).context("payload-file must contain valid JSON")?;
        return Ok(v);
    }

    let raw = payload.context("must provide --payload or --payload-file")?;
    let v: Value = serde_json::from_str(raw.trim()).context("--payload must be valid JSON")?;
    Ok(v)
}

/// `-` for absent values in key=value output.
pub fn or_dash(v: Option<&str>) -> &str {
    v.unwrap_or("-")
}
