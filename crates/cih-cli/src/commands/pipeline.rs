//! `cih compare`, `cih reconcile`, `cih attribute`.

use anyhow::{anyhow, Context, Result};
use cih_artifacts::RunArtifacts;
use cih_attribution::{attribute_all, ConflictPolicy};
use cih_config::{ConfigCommand, UnusedKeyPolicy};
use cih_reconcile::{
    compare_sources, reconcile_with_ids, EmailPolicy, GlobalIdSource, RandomIds, ReconcileOptions,
    SeededIds,
};
use cih_source::{load_master_csv, write_attributed_csv, write_master_csv, CsvFileSource, RecordSource};
use uuid::Uuid;

use super::{load_hub_config, or_dash};

fn source_for(hub: &cih_config::HubConfig) -> CsvFileSource {
    CsvFileSource {
        crm_customers: hub.sources.crm_customers.clone(),
        ecommerce_users: hub.sources.ecommerce_users.clone(),
        erp_orders: hub.sources.erp_orders.clone(),
    }
}

fn email_policy(raw: &str) -> Result<EmailPolicy> {
    raw.parse::<EmailPolicy>()
        .map_err(|e| anyhow!("CONFIG_INVALID /reconcile/email_policy: {e}"))
}

pub fn compare(config_paths: &[String], policy: UnusedKeyPolicy) -> Result<()> {
    let (_, hub) = load_hub_config(config_paths, ConfigCommand::Compare, policy)?;
    let email = email_policy(&hub.reconcile.email_policy)?;
    let source = source_for(&hub);

    let crm = source.crm_customers().context("load crm customers failed")?;
    let ecom = source
        .ecommerce_users()
        .context("load ecommerce users failed")?;

    let cmp = compare_sources(&crm, &ecom, email);
    for row in &cmp.rows {
        println!(
            "side={} crm_id={} email={} ecommerce_id={} email_address={}",
            row.side.as_str(),
            or_dash(row.crm_id.as_deref()),
            or_dash(row.email.as_deref()),
            or_dash(row.ecommerce_id.as_deref()),
            or_dash(row.email_address.as_deref()),
        );
    }
    println!(
        "summary both={} crm_only={} ecommerce_only={}",
        cmp.summary.both, cmp.summary.crm_only, cmp.summary.ecommerce_only
    );
    Ok(())
}

pub fn reconcile(
    config_paths: &[String],
    policy: UnusedKeyPolicy,
    fresh: bool,
    id_namespace: Option<Uuid>,
) -> Result<()> {
    let (loaded, hub) = load_hub_config(config_paths, ConfigCommand::Reconcile, policy)?;
    let options = ReconcileOptions {
        email_policy: email_policy(&hub.reconcile.email_policy)?,
        carry_forward_unmatched: hub.reconcile.carry_forward_unmatched,
    };
    let source = source_for(&hub);

    let crm = source.crm_customers().context("load crm customers failed")?;
    let ecom = source
        .ecommerce_users()
        .context("load ecommerce users failed")?;

    let master_path = &hub.master.path;
    let prior = if !fresh && hub.master.reuse_prior && master_path.exists() {
        load_master_csv(master_path)
            .with_context(|| format!("load prior master failed: {}", master_path.display()))?
    } else {
        Vec::new()
    };

    let mut ids: Box<dyn GlobalIdSource> = match id_namespace {
        Some(ns) => Box::new(SeededIds::new(ns)),
        None => Box::new(RandomIds),
    };
    let report = reconcile_with_ids(&crm, &ecom, &prior, &options, ids.as_mut());

    write_master_csv(master_path, &report.identities)
        .with_context(|| format!("write master failed: {}", master_path.display()))?;

    let run_id = Uuid::new_v4();
    let mut run = RunArtifacts::create(&hub.exports.root, run_id, "reconcile", &loaded.config_hash)?;
    run.record_input("crm_customers", &hub.sources.crm_customers);
    run.record_input("ecommerce_users", &hub.sources.ecommerce_users);
    if !prior.is_empty() {
        run.record_input("prior_master", master_path);
    }
    run.record_output("master", master_path);
    run.write_json("diffs", "diffs.json", &report.diffs)?;
    let manifest_path = run.finish(serde_json::to_value(&report.stats)?)?;

    let s = &report.stats;
    println!("reconcile_ok=true run_id={}", run_id);
    println!(
        "identities={} matched={} crm_only={} ecommerce_only={}",
        report.identities.len(),
        s.matched,
        s.crm_only,
        s.ecommerce_only
    );
    println!(
        "prior={} reused_ids={} fresh_ids={} carried_forward={} superseded={} diffs={}",
        prior.len(),
        s.reused_ids,
        s.fresh_ids,
        s.carried_forward,
        s.superseded,
        report.diffs.len()
    );
    println!("master_path={}", master_path.display());
    println!("manifest_path={}", manifest_path.display());
    Ok(())
}

pub fn attribute(config_paths: &[String], policy: UnusedKeyPolicy) -> Result<()> {
    let (loaded, hub) = load_hub_config(config_paths, ConfigCommand::Attribute, policy)?;
    let conflict_policy = hub
        .attribution
        .conflict_policy
        .parse::<ConflictPolicy>()
        .map_err(|e| anyhow!("CONFIG_INVALID /attribution/conflict_policy: {e}"))?;

    let master_path = &hub.master.path;
    let master = load_master_csv(master_path).with_context(|| {
        format!(
            "load master failed: {} (run `cih reconcile` first)",
            master_path.display()
        )
    })?;
    let orders = source_for(&hub)
        .erp_orders()
        .context("load erp orders failed")?;

    let report = attribute_all(&orders, &master, conflict_policy)?;

    let out = &hub.attribution.output;
    write_attributed_csv(out, &report.orders)
        .with_context(|| format!("write attributed orders failed: {}", out.display()))?;

    let run_id = Uuid::new_v4();
    let mut run = RunArtifacts::create(&hub.exports.root, run_id, "attribute", &loaded.config_hash)?;
    run.record_input("erp_orders", &hub.sources.erp_orders);
    run.record_input("master", master_path);
    run.record_output("orders_attributed", out);
    let unresolved: Vec<&str> = report
        .unresolved_orders()
        .map(|o| o.order_id.as_str())
        .collect();
    run.write_json("unresolved", "unresolved_orders.json", &unresolved)?;
    let manifest_path = run.finish(serde_json::json!({
        "orders": report.orders.len(),
        "resolved_via_crm": report.resolved_via_crm,
        "resolved_via_ecommerce": report.resolved_via_ecommerce,
        "unresolved": report.unresolved,
        "conflicts": report.conflicts,
    }))?;

    println!("attribute_ok=true run_id={}", run_id);
    println!(
        "orders={} via_crm={} via_ecommerce={} unresolved={} conflicts={}",
        report.orders.len(),
        report.resolved_via_crm,
        report.resolved_via_ecommerce,
        report.unresolved,
        report.conflicts
    );
    println!("output_path={}", out.display());
    println!("manifest_path={}", manifest_path.display());
    Ok(())
}
