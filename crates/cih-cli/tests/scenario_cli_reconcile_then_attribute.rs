use assert_cmd::prelude::*;
use cih_testkit::{read_csv_rows, HubWorkspace, CRM_CSV};
use predicates::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::process::Command;

const NS: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

fn cih() -> Command {
    Command::cargo_bin("cih").expect("cih binary")
}

#[test]
fn cli_reconcile_writes_master_and_manifest() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;

    cih()
        .args(["reconcile", "--config"])
        .arg(ws.config_path())
        .args(["--id-namespace", NS])
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile_ok=true"))
        .stdout(predicate::str::contains(
            "identities=5 matched=2 crm_only=2 ecommerce_only=1",
        ))
        .stdout(predicate::str::contains("prior=0 reused_ids=0 fresh_ids=5"));

    let rows = read_csv_rows(&ws.master_path())?;
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["crm_id"], "1");
    assert_eq!(rows[0]["ecommerce_id"], "u-9");
    assert_eq!(rows[0]["name"], "Ada Lovelace");

    let manifests = ws.manifests()?;
    assert_eq!(manifests.len(), 1);
    let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(&manifests[0])?)?;
    assert_eq!(manifest["command"], "reconcile");
    assert_eq!(manifest["summary"]["matched"], 2);
    assert!(manifests[0].with_file_name("diffs.json").exists());
    Ok(())
}

#[test]
fn cli_rerun_reuses_ids_and_fresh_flag_remints() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    let run = |extra: &[&str]| {
        let mut cmd = cih();
        cmd.args(["reconcile", "--config"]).arg(ws.config_path()).args(extra);
        cmd
    };

    run(&["--id-namespace", NS]).assert().success();
    let first = fs::read_to_string(ws.master_path())?;

    // Without a namespace new ids would be random; none are needed here.
    run(&[])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "prior=5 reused_ids=5 fresh_ids=0 carried_forward=0 superseded=0 diffs=0",
        ));
    assert_eq!(fs::read_to_string(ws.master_path())?, first);

    // Same namespace from scratch reproduces the same ids.
    run(&["--fresh", "--id-namespace", NS])
        .assert()
        .success()
        .stdout(predicate::str::contains("prior=0 reused_ids=0 fresh_ids=5"));
    assert_eq!(fs::read_to_string(ws.master_path())?, first);
    Ok(())
}

#[test]
fn cli_seeded_rerun_with_new_customer_mints_unused_id() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    let reconcile = || {
        let mut cmd = cih();
        cmd.args(["reconcile", "--config"])
            .arg(ws.config_path())
            .args(["--id-namespace", NS]);
        cmd
    };

    reconcile().assert().success();
    let first = read_csv_rows(&ws.master_path())?;

    ws.write(
        "data/crm_customers.csv",
        &format!("{CRM_CSV}5,Barbara Liskov,barbara@example.com,\n"),
    )?;
    reconcile()
        .assert()
        .success()
        .stdout(predicate::str::contains("prior=5 reused_ids=5 fresh_ids=1"));

    let second = read_csv_rows(&ws.master_path())?;
    assert_eq!(second.len(), 6);
    for prev in &first {
        let same = second
            .iter()
            .find(|r| r["crm_id"] == prev["crm_id"] && r["ecommerce_id"] == prev["ecommerce_id"])
            .expect("prior identity still present");
        assert_eq!(same["global_id"], prev["global_id"]);
    }
    let ids: HashSet<&str> = second.iter().map(|r| r["global_id"].as_str()).collect();
    assert_eq!(ids.len(), second.len(), "global ids must be unique");
    Ok(())
}

#[test]
fn cli_attribute_after_reconcile() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;

    cih()
        .args(["reconcile", "--config"])
        .arg(ws.config_path())
        .assert()
        .success();

    cih()
        .args(["attribute", "--config"])
        .arg(ws.config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("attribute_ok=true"))
        .stdout(predicate::str::contains(
            "orders=5 via_crm=1 via_ecommerce=2 unresolved=2 conflicts=0",
        ));

    let master = read_csv_rows(&ws.master_path())?;
    let orders = read_csv_rows(&ws.attributed_path())?;
    assert_eq!(orders[0]["order_id"], "o1");
    assert_eq!(orders[0]["path"], "crm");
    assert_eq!(orders[0]["global_id"], master[0]["global_id"]);
    assert_eq!(orders[2]["path"], "ecommerce");
    assert_eq!(orders[2]["global_id"], master[4]["global_id"]);
    assert_eq!(ws.manifests()?.len(), 2);
    Ok(())
}

#[test]
fn cli_attribute_without_master_fails() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    cih()
        .args(["attribute", "--config"])
        .arg(ws.config_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("run `cih reconcile` first"));
    assert!(!ws.attributed_path().exists());
    Ok(())
}

#[test]
fn cli_compare_prints_outer_join() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    cih()
        .args(["compare", "--config"])
        .arg(ws.config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "side=both crm_id=2 email=Grace@Example.com ecommerce_id=u-10 email_address=grace@example.com",
        ))
        .stdout(predicate::str::contains("side=crm_only crm_id=3 email=- ecommerce_id=-"))
        .stdout(predicate::str::contains("summary both=2 crm_only=2 ecommerce_only=1"));
    Ok(())
}
