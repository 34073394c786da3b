//! A second run over the written master file keeps every global id, and
//! orders keep attributing to the same customers.

use anyhow::Result;
use cih_attribution::{attribute_all, ConflictPolicy};
use cih_reconcile::{reconcile, reconcile_with_prior, ReconcileOptions};
use cih_source::{load_master_csv, write_master_csv, CsvFileSource, RecordSource};
use cih_testkit::{HubWorkspace, ECOMMERCE_CSV};

fn source(ws: &HubWorkspace) -> CsvFileSource {
    CsvFileSource {
        crm_customers: ws.path("data/crm_customers.csv"),
        ecommerce_users: ws.path("data/ecommerce_users.csv"),
        erp_orders: ws.path("data/erp_orders.csv"),
    }
}

#[test]
fn rerun_against_written_master_reuses_every_id() -> Result<()> {
    let ws = HubWorkspace::new()?;
    let src = source(&ws);
    let opts = ReconcileOptions::default();

    let first = reconcile(&src.crm_customers()?, &src.ecommerce_users()?, &opts);
    write_master_csv(&ws.master_path(), &first.identities)?;

    let prior = load_master_csv(&ws.master_path())?;
    let second = reconcile_with_prior(&src.crm_customers()?, &src.ecommerce_users()?, &prior, &opts);

    assert_eq!(second.identities, first.identities);
    assert_eq!(second.stats.reused_ids, first.identities.len());
    assert_eq!(second.stats.fresh_ids, 0);
    assert!(second.diffs.is_empty(), "diffs: {:?}", second.diffs);

    let orders = src.erp_orders()?;
    let a = attribute_all(&orders, &first.identities, ConflictPolicy::PreferCrm)?;
    let b = attribute_all(&orders, &second.identities, ConflictPolicy::PreferCrm)?;
    assert_eq!(a.orders, b.orders);
    Ok(())
}

#[test]
fn new_signup_joins_existing_crm_customer_without_new_id() -> Result<()> {
    let ws = HubWorkspace::new()?;
    let src = source(&ws);
    let opts = ReconcileOptions::default();

    let first = reconcile(&src.crm_customers()?, &src.ecommerce_users()?, &opts);
    write_master_csv(&ws.master_path(), &first.identities)?;
    let edsger_before = first.identity_for_crm("4").unwrap().global_id;

    // Edsger signs up on the shop.
    ws.write(
        "data/ecommerce_users.csv",
        &format!("{ECOMMERCE_CSV}u-12,EDSGER@example.com,app\n"),
    )?;

    let prior = load_master_csv(&ws.master_path())?;
    let second = reconcile_with_prior(&src.crm_customers()?, &src.ecommerce_users()?, &prior, &opts);

    let edsger = second.identity_for_crm("4").unwrap();
    assert_eq!(edsger.global_id, edsger_before);
    assert_eq!(edsger.ecommerce_id.as_deref(), Some("u-12"));
    assert_eq!(second.identities.len(), first.identities.len());
    assert_eq!(second.stats.fresh_ids, 0);
    Ok(())
}
