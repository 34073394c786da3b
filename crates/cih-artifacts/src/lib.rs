//! Per-run export directory: `exports/<run_id>/` holding a `manifest.json`
//! plus whatever reports the run wrote next to it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_SCHEMA_VERSION: i32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub command: String,
    pub config_hash: String,
    pub created_at_utc: DateTime<Utc>,
    /// label -> source path as given.
    pub inputs: BTreeMap<String, String>,
    /// label -> written path. Files inside the run dir are stored relative to it.
    pub outputs: BTreeMap<String, String>,
    /// Command-specific counters.
    pub summary: Value,
}

/// An open run directory. Nothing is final until [`RunArtifacts::finish`]
/// writes the manifest.
#[derive(Debug)]
pub struct RunArtifacts {
    run_dir: PathBuf,
    manifest: RunManifest,
}

impl RunArtifacts {
    pub fn create(exports_root: &Path, run_id: Uuid, command: &str, config_hash: &str) -> Result<Self> {
        let run_dir = exports_root.join(run_id.to_string());
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;

        Ok(Self {
            run_dir,
            manifest: RunManifest {
                schema_version: MANIFEST_SCHEMA_VERSION,
                run_id,
                command: command.to_string(),
                config_hash: config_hash.to_string(),
                created_at_utc: Utc::now(),
                inputs: BTreeMap::new(),
                outputs: BTreeMap::new(),
                summary: Value::Null,
            },
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn run_id(&self) -> Uuid {
        self.manifest.run_id
    }

    pub fn record_input(&mut self, label: &str, path: &Path) {
        self.manifest
            .inputs
            .insert(label.to_string(), path.display().to_string());
    }

    /// Note a file written outside the run dir (e.g. the master CSV).
    pub fn record_output(&mut self, label: &str, path: &Path) {
        let shown = path
            .strip_prefix(&self.run_dir)
            .unwrap_or(path)
            .display()
            .to_string();
        self.manifest.outputs.insert(label.to_string(), shown);
    }

    /// Pretty JSON report inside the run dir; recorded as an output under `label`.
    pub fn write_json<T: Serialize>(&mut self, label: &str, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.run_dir.join(file_name);
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("serialize {file_name} failed"))?;
        fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("write {} failed", path.display()))?;
        self.record_output(label, &path);
        Ok(path)
    }

    /// Write `manifest.json` (overwrites) and return its path.
    pub fn finish(mut self, summary: Value) -> Result<PathBuf> {
        self.manifest.summary = summary;
        let manifest_path = self.run_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.manifest).context("serialize manifest failed")?;
        fs::write(&manifest_path, format!("{json}\n"))
            .with_context(|| format!("write manifest failed: {}", manifest_path.display()))?;
        Ok(manifest_path)
    }
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read manifest failed: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse manifest failed: {}", path.display()))
}
