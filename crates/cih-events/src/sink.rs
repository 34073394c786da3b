use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::PayloadEnvelope;

/// Destination for validated events.
pub trait EventSink {
    fn emit(&mut self, envelope: &PayloadEnvelope) -> Result<()>;
}

/// Prints each event's payload as pretty JSON on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&mut self, envelope: &PayloadEnvelope) -> Result<()> {
        let text = serde_json::to_string_pretty(&envelope.payload)
            .context("serialize event payload failed")?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{text}").context("write event to stdout failed")?;
        Ok(())
    }
}

/// Append-only JSON Lines file, one envelope per line, keys sorted.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
    written: u64,
}

impl JsonLinesSink {
    /// Creates parent dirs. An existing file is appended to, never truncated.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        Ok(Self { path, written: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines appended by this sink instance.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&mut self, envelope: &PayloadEnvelope) -> Result<()> {
        let line = canonical_json_line(envelope)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open event log {:?}", self.path))?;
        f.write_all(line.as_bytes())
            .context("write event line failed")?;
        f.write_all(b"\n").context("write newline failed")?;
        self.written += 1;
        Ok(())
    }
}

/// Keeps envelopes in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    sent: Vec<PayloadEnvelope>,
}

impl MemorySink {
    pub fn envelopes(&self) -> &[PayloadEnvelope] {
        &self.sent
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, envelope: &PayloadEnvelope) -> Result<()> {
        self.sent.push(envelope.clone());
        Ok(())
    }
}

/// Read back every envelope of a JSON Lines event log. Blank lines are skipped.
pub fn read_envelopes(path: impl AsRef<Path>) -> Result<Vec<PayloadEnvelope>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read event log {:?}", path.as_ref()))?;

    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let env: PayloadEnvelope = serde_json::from_str(trimmed)
            .with_context(|| format!("parse event at line {}", i + 1))?;
        out.push(env);
    }
    Ok(out)
}

fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize event envelope failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
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
