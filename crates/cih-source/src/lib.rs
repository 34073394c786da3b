//! cih-source
//!
//! Record Source Adapter: turns the CRM, e-commerce and ERP tabular exports
//! into ordered record sequences, and persists the reconciled master set and
//! attributed orders back to CSV.
//!
//! ## Column contracts (header names case-insensitive, order-independent)
//!
//! | File                    | Columns                                              |
//! |-------------------------|------------------------------------------------------|
//! | CRM customers           | `id`, `name`, `email`, `phone`                       |
//! | E-commerce users        | `user_id`, `email_address`, anything else -> `extra` |
//! | ERP orders              | `order_id`*, `customer_ref`, `total_amount`*, extra  |
//! | Master identity set     | `global_id`*, `crm_id`, `ecommerce_id`, `email`, `name`, `phone` |
//!
//! Columns marked `*` must be present in the header. Every other missing
//! column or blank cell surfaces as `None` on the typed record.

mod flat;
mod master_csv;
mod records;

use std::fmt;
use std::path::PathBuf;

use cih_schemas::{CrmCustomerRecord, EcommerceUserRecord, ErpOrderRecord};

pub use flat::{read_flat_records, read_flat_records_from_path, FlatRecord, FlatTable};
pub use master_csv::{
    attributed_to_csv_string, load_master_csv, master_to_csv_string, parse_master_csv_str,
    write_attributed_csv, write_master_csv,
};
pub use records::{
    crm_from_flat, ecommerce_from_flat, load_crm_csv, load_ecommerce_csv, load_orders_csv,
    order_from_flat, parse_crm_csv_str, parse_ecommerce_csv_str, parse_orders_csv_str,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while reading or writing tabular records.
#[derive(Debug)]
pub enum SourceError {
    /// File open / read / write failure.
    Io(String),
    /// Malformed CSV (bad quoting, invalid UTF-8, ...).
    Csv(String),
    /// The header row is missing a column this file cannot do without.
    MissingHeader(String),
    /// A field could not be parsed into the expected type.
    ParseField {
        row: usize,
        field: &'static str,
        raw: String,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Io(msg) => write!(f, "source io error: {msg}"),
            SourceError::Csv(msg) => write!(f, "source csv error: {msg}"),
            SourceError::MissingHeader(col) => {
                write!(f, "source missing required header column: '{col}'")
            }
            SourceError::ParseField { row, field, raw } => {
                write!(
                    f,
                    "source row {row}: cannot parse field '{field}' from value '{raw}'"
                )
            }
        }
    }
}

impl std::error::Error for SourceError {}

impl From<csv::Error> for SourceError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            SourceError::Io(e.to_string())
        } else {
            SourceError::Csv(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Source seam
// ---------------------------------------------------------------------------

/// Supplies the three input sequences, fully materialized and in source order.
pub trait RecordSource {
    fn crm_customers(&self) -> Result<Vec<CrmCustomerRecord>, SourceError>;
    fn ecommerce_users(&self) -> Result<Vec<EcommerceUserRecord>, SourceError>;
    fn erp_orders(&self) -> Result<Vec<ErpOrderRecord>, SourceError>;
}

/// Reads each sequence from its own CSV file.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    pub crm_customers: PathBuf,
    pub ecommerce_users: PathBuf,
    pub erp_orders: PathBuf,
}

impl RecordSource for CsvFileSource {
    fn crm_customers(&self) -> Result<Vec<CrmCustomerRecord>, SourceError> {
        load_crm_csv(&self.crm_customers)
    }

    fn ecommerce_users(&self) -> Result<Vec<EcommerceUserRecord>, SourceError> {
        load_ecommerce_csv(&self.ecommerce_users)
    }

    fn erp_orders(&self) -> Result<Vec<ErpOrderRecord>, SourceError> {
        load_orders_csv(&self.erp_orders)
    }
}

/// Pre-loaded sequences; handy for tests and for callers that already hold
/// the records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub crm: Vec<CrmCustomerRecord>,
    pub ecommerce: Vec<EcommerceUserRecord>,
    pub orders: Vec<ErpOrderRecord>,
}

impl RecordSource for InMemorySource {
    fn crm_customers(&self) -> Result<Vec<CrmCustomerRecord>, SourceError> {
        Ok(self.crm.clone())
    }

    fn ecommerce_users(&self) -> Result<Vec<EcommerceUserRecord>, SourceError> {
        Ok(self.ecommerce.clone())
    }

    fn erp_orders(&self) -> Result<Vec<ErpOrderRecord>, SourceError> {
        Ok(self.orders.clone())
    }
}
