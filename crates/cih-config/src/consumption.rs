//! Unused-key guard.
//!
//! Each command registers the JSON-pointer prefixes it reads. A config leaf not
//! under any registered prefix is "unused": usually a typo or a stale setting.
//! `"/master"` consumes `/master/path` but not `/master_path`.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    Compare,
    Reconcile,
    Attribute,
    PublishOrder,
    Validate,
}

impl ConfigCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigCommand::Compare => "compare",
            ConfigCommand::Reconcile => "reconcile",
            ConfigCommand::Attribute => "attribute",
            ConfigCommand::PublishOrder => "publish-order",
            ConfigCommand::Validate => "validate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub command: String,
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Pointers each command reads through `HubConfig`. Keep in step with the
/// CLI: a prefix listed here that the command never reads hides typos.
pub fn consumed_pointers_for_command(command: ConfigCommand) -> &'static [&'static str] {
    match command {
        ConfigCommand::Compare => &[
            "/sources/crm_customers",
            "/sources/ecommerce_users",
            "/reconcile/email_policy",
        ],
        ConfigCommand::Reconcile => &[
            "/sources/crm_customers",
            "/sources/ecommerce_users",
            "/master",
            "/reconcile",
            "/exports/root",
        ],
        ConfigCommand::Attribute => &[
            "/sources/erp_orders",
            "/master/path",
            "/attribution",
            "/exports/root",
        ],
        ConfigCommand::PublishOrder => &["/contracts", "/events"],
        ConfigCommand::Validate => &["/contracts/dir"],
    }
}

/// `Warn` always returns the report; `Fail` errors when anything is unused.
pub fn report_unused_keys(
    command: ConfigCommand,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers_for_command(command)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        command: command.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (command={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.command,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ => {
            if prefix.is_empty() {
                // An empty root document has nothing to report.
                if !matches!(v, Value::Object(_)) {
                    out.push("/".to_string());
                }
            } else {
                out.push(prefix.to_string());
            }
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}
