//! Typed conversions from flat rows to the three input record kinds.

use std::path::Path;

use cih_schemas::{CrmCustomerRecord, EcommerceUserRecord, ErpOrderRecord, ExtraFields};
use tracing::debug;

use crate::flat::{read_flat_records, read_flat_records_from_path, FlatRecord, FlatTable};
use crate::SourceError;

const ORDER_REQUIRED: [&str; 2] = ["order_id", "total_amount"];

/// Non-blank cell value, or `None` when the column is missing or empty.
fn cell(rec: &FlatRecord, col: &str) -> Option<String> {
    rec.get(col).filter(|v| !v.is_empty()).cloned()
}

fn extra_fields(rec: &FlatRecord, known: &[&str]) -> ExtraFields {
    rec.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn crm_from_flat(rec: &FlatRecord) -> CrmCustomerRecord {
    CrmCustomerRecord {
        id: cell(rec, "id"),
        name: cell(rec, "name"),
        email: cell(rec, "email"),
        phone: cell(rec, "phone"),
    }
}

pub fn ecommerce_from_flat(rec: &FlatRecord) -> EcommerceUserRecord {
    EcommerceUserRecord {
        user_id: cell(rec, "user_id"),
        email_address: cell(rec, "email_address"),
        extra: extra_fields(rec, &["user_id", "email_address"]),
    }
}

/// `row` is the 1-based file line (header = 1) used in error messages.
pub fn order_from_flat(row: usize, rec: &FlatRecord) -> Result<ErpOrderRecord, SourceError> {
    let order_id = cell(rec, "order_id").ok_or(SourceError::ParseField {
        row,
        field: "order_id",
        raw: String::new(),
    })?;

    let raw_total = rec.get("total_amount").cloned().unwrap_or_default();
    let total_amount = match raw_total.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            return Err(SourceError::ParseField {
                row,
                field: "total_amount",
                raw: raw_total,
            })
        }
    };

    Ok(ErpOrderRecord {
        order_id,
        customer_ref: cell(rec, "customer_ref"),
        total_amount,
        extra: extra_fields(rec, &["order_id", "customer_ref", "total_amount"]),
    })
}

// ---------------------------------------------------------------------------
// Table-level parsing
// ---------------------------------------------------------------------------

fn crm_from_table(table: &FlatTable) -> Vec<CrmCustomerRecord> {
    table.rows.iter().map(crm_from_flat).collect()
}

fn ecommerce_from_table(table: &FlatTable) -> Vec<EcommerceUserRecord> {
    table.rows.iter().map(ecommerce_from_flat).collect()
}

fn orders_from_table(table: &FlatTable) -> Result<Vec<ErpOrderRecord>, SourceError> {
    if table.headers.is_empty() {
        return Ok(Vec::new());
    }
    table.require(&ORDER_REQUIRED)?;
    table
        .numbered_rows()
        .map(|(line, rec)| order_from_flat(line, rec))
        .collect()
}

pub fn parse_crm_csv_str(src: &str) -> Result<Vec<CrmCustomerRecord>, SourceError> {
    Ok(crm_from_table(&read_flat_records(src.as_bytes())?))
}

pub fn parse_ecommerce_csv_str(src: &str) -> Result<Vec<EcommerceUserRecord>, SourceError> {
    Ok(ecommerce_from_table(&read_flat_records(src.as_bytes())?))
}

pub fn parse_orders_csv_str(src: &str) -> Result<Vec<ErpOrderRecord>, SourceError> {
    orders_from_table(&read_flat_records(src.as_bytes())?)
}

pub fn load_crm_csv(path: &Path) -> Result<Vec<CrmCustomerRecord>, SourceError> {
    let records = crm_from_table(&read_flat_records_from_path(path)?);
    debug!(path = %path.display(), rows = records.len(), "loaded crm customers");
    Ok(records)
}

pub fn load_ecommerce_csv(path: &Path) -> Result<Vec<EcommerceUserRecord>, SourceError> {
    let records = ecommerce_from_table(&read_flat_records_from_path(path)?);
    debug!(path = %path.display(), rows = records.len(), "loaded ecommerce users");
    Ok(records)
}

pub fn load_orders_csv(path: &Path) -> Result<Vec<ErpOrderRecord>, SourceError> {
    let records = orders_from_table(&read_flat_records_from_path(path)?)?;
    debug!(path = %path.display(), rows = records.len(), "loaded erp orders");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crm_missing_columns_surface_as_absent() {
        let recs = parse_crm_csv_str("id,name\n1,Ada\n").unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id.as_deref(), Some("1"));
        assert_eq!(recs[0].email, None);
        assert_eq!(recs[0].phone, None);
    }

    #[test]
    fn crm_blank_email_is_absent() {
        let recs = parse_crm_csv_str("id,name,email,phone\n1,Ada,  ,\n").unwrap();
        assert_eq!(recs[0].email, None);
    }

    #[test]
    fn crm_cells_arrive_trimmed_but_case_preserved() {
        let recs = parse_crm_csv_str("id,email\n 1 , A@X.com \n2,   \n").unwrap();
        assert_eq!(recs[0].id.as_deref(), Some("1"));
        assert_eq!(recs[0].email.as_deref(), Some("A@X.com"));
        assert_eq!(recs[1].email, None);
    }

    #[test]
    fn ecommerce_keeps_unknown_columns_as_extra() {
        let recs =
            parse_ecommerce_csv_str("user_id,email_address,signup_date\n9,a@x.com,2024-01-02\n")
                .unwrap();
        assert_eq!(recs[0].user_id.as_deref(), Some("9"));
        assert_eq!(recs[0].email_address.as_deref(), Some("a@x.com"));
        assert_eq!(recs[0].extra["signup_date"], "2024-01-02");
        assert!(!recs[0].extra.contains_key("user_id"));
    }

    #[test]
    fn orders_parse_amount_and_reference() {
        let recs =
            parse_orders_csv_str("order_id,customer_ref,total_amount,status\no1,1,50,open\n")
                .unwrap();
        assert_eq!(recs[0].order_id, "o1");
        assert_eq!(recs[0].customer_ref.as_deref(), Some("1"));
        assert_eq!(recs[0].total_amount, 50.0);
        assert_eq!(recs[0].extra["status"], "open");
    }

    #[test]
    fn orders_without_reference_keep_none() {
        let recs = parse_orders_csv_str("order_id,customer_ref,total_amount\no1,,12.5\n").unwrap();
        assert_eq!(recs[0].customer_ref, None);
    }

    #[test]
    fn orders_missing_amount_header_is_error() {
        let err = parse_orders_csv_str("order_id,customer_ref\no1,1\n").unwrap_err();
        assert!(matches!(err, SourceError::MissingHeader(c) if c == "total_amount"));
    }

    #[test]
    fn orders_bad_amount_reports_row_and_value() {
        let err =
            parse_orders_csv_str("order_id,customer_ref,total_amount\no1,1,50\no2,1,lots\n")
                .unwrap_err();
        match err {
            SourceError::ParseField { row, field, raw } => {
                assert_eq!(row, 3);
                assert_eq!(field, "total_amount");
                assert_eq!(raw, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn orders_non_finite_amount_rejected() {
        let err = parse_orders_csv_str("order_id,total_amount\no1,NaN\n").unwrap_err();
        assert!(matches!(err, SourceError::ParseField { field: "total_amount", .. }));
    }

    #[test]
    fn parse_error_reports_source_line_after_blank_rows() {
        let err = parse_orders_csv_str("order_id,total_amount\n,\no1,10\n\no2,oops\n").unwrap_err();
        assert!(matches!(err, SourceError::ParseField { row: 5, field: "total_amount", .. }));
    }

    #[test]
    fn empty_orders_file_is_empty_sequence() {
        assert!(parse_orders_csv_str("").unwrap().is_empty());
    }
}
