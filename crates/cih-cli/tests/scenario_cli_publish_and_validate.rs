use assert_cmd::prelude::*;
use cih_testkit::HubWorkspace;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

fn cih() -> Command {
    Command::cargo_bin("cih").expect("cih binary")
}

#[test]
fn cli_publish_appends_valid_event_to_log() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;

    cih()
        .args(["publish-order", "--config"])
        .arg(ws.config_path())
        .args(["--customer-id", "c-1", "--total", "25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("published=true event_id="));

    let log = fs::read_to_string(ws.events_path())?;
    assert_eq!(log.lines().count(), 1);
    let line: serde_json::Value = serde_json::from_str(log.lines().next().unwrap_or_default())?;
    assert_eq!(line["event_type"], "OrderPlaced");
    assert_eq!(line["payload"]["customer_id"], "c-1");
    Ok(())
}

#[test]
fn cli_publish_negative_total_fails_and_emits_nothing() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;

    cih()
        .args(["publish-order", "--config"])
        .arg(ws.config_path())
        .args(["--customer-id", "c-1", "--total", "-10"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("published=false"))
        .stdout(predicate::str::contains("error=Field total must be >= 0"));

    assert!(!ws.events_path().exists());
    Ok(())
}

#[test]
fn cli_publish_to_stdout_sink_prints_payload() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    let overlay = ws.write("stdout.yaml", "events:\n  sink: stdout\n")?;

    cih()
        .args(["publish-order", "--config"])
        .arg(ws.config_path())
        .arg("--config")
        .arg(&overlay)
        .args(["--customer-id", "c-2", "--total", "9.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""customer_id": "c-2""#))
        .stdout(predicate::str::contains(r#""total": 9.5"#));
    Ok(())
}

#[test]
fn cli_validate_reports_every_missing_field() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;

    cih()
        .args(["validate", "--config"])
        .arg(ws.config_path())
        .args(["--contract", "order_placed_contract_v1", "--payload", "{}"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("valid=false contract=order_placed_contract_v1 errors=4"))
        .stdout(predicate::str::contains("error=Missing required field: event_id"))
        .stdout(predicate::str::contains("error=Missing required field: timestamp"));
    Ok(())
}

#[test]
fn cli_validate_accepts_payload_file() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    let payload = ws.write(
        "payload.json",
        r#"{"event_id": "e-1", "customer_id": "c-1", "total": 0, "timestamp": "2026-01-01T00:00:00Z"}"#,
    )?;

    cih()
        .args(["validate", "--config"])
        .arg(ws.config_path())
        .args(["--contract", "order_placed_contract_v1", "--payload-file"])
        .arg(&payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid=true"));
    Ok(())
}

#[test]
fn cli_unknown_contract_is_a_config_error() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    cih()
        .args(["validate", "--config"])
        .arg(ws.config_path())
        .args(["--contract", "refund_issued_contract_v1", "--payload", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    Ok(())
}

#[test]
fn cli_strict_config_rejects_keys_the_command_ignores() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    cih()
        .args(["--strict-config", "validate", "--config"])
        .arg(ws.config_path())
        .args(["--contract", "order_placed_contract_v1", "--payload", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
    Ok(())
}

#[test]
fn cli_config_hash_is_stable() -> anyhow::Result<()> {
    let ws = HubWorkspace::new()?;
    let out1 = cih().arg("config-hash").arg(ws.config_path()).output()?;
    let out2 = cih().arg("config-hash").arg(ws.config_path()).output()?;
    assert!(out1.status.success());
    assert_eq!(out1.stdout, out2.stdout);
    assert!(String::from_utf8(out1.stdout)?.starts_with("config_hash="));
    Ok(())
}
