//! cih-contracts
//!
//! Versioned event contracts: load a field-rule document, check a payload
//! against it, collect every violation.
//!
//! A contract document looks like
//!
//! ```json
//! {"fields": {"total": {"required": true, "type": "number", "minimum": 0}}}
//! ```
//!
//! Each field compiles into a list of [`Rule`]s. Violations are gathered in
//! document field order, then rule order; nothing short-circuits.
//!
//! Loading problems ([`ContractLoadError`]) are configuration errors and are
//! kept apart from payload violations ([`Violation`]).

mod document;
mod registry;
mod validate;

pub use document::{ContractDocument, DocumentError, FieldRules, FieldType, Rule};
pub use registry::{load_contract, ContractKey, ContractLoadError, ContractRegistry};
pub use validate::{check, validate, ValidationErrors, Violation};
