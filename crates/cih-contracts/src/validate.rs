use std::fmt;

use serde_json::{Map, Number, Value};

use crate::{ContractDocument, Rule};

/// A single broken rule. `Display` gives the canonical error text.
#[derive(Clone, Debug, PartialEq)]
pub enum Violation {
    MissingRequired { field: String },
    NotString { field: String },
    NotNumber { field: String },
    BelowMinimum { field: String, minimum: Number },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingRequired { field } => write!(f, "Missing required field: {field}"),
            Violation::NotString { field } => write!(f, "Field {field} must be string"),
            Violation::NotNumber { field } => write!(f, "Field {field} must be number"),
            Violation::BelowMinimum { field, minimum } => {
                write!(f, "Field {field} must be >= {minimum}")
            }
        }
    }
}

fn below(value: &Number, minimum: &Number) -> bool {
    match (value.as_f64(), minimum.as_f64()) {
        (Some(v), Some(m)) => v < m,
        _ => false,
    }
}

/// Evaluate every rule of every field; return all violations in order.
pub fn check(payload: &Map<String, Value>, contract: &ContractDocument) -> Vec<Violation> {
    let mut out = Vec::new();

    for field in &contract.fields {
        let value = payload.get(&field.name);
        let name = || field.name.clone();

        for rule in &field.rules {
            match rule {
                Rule::Required => {
                    if value.is_none() {
                        out.push(Violation::MissingRequired { field: name() });
                    }
                }
                Rule::TypeString => {
                    if value.is_some_and(|v| !v.is_string()) {
                        out.push(Violation::NotString { field: name() });
                    }
                }
                Rule::TypeNumber => {
                    if value.is_some_and(|v| !v.is_number()) {
                        out.push(Violation::NotNumber { field: name() });
                    }
                }
                Rule::Minimum(min) => {
                    if let Some(Value::Number(n)) = value {
                        if below(n, min) {
                            out.push(Violation::BelowMinimum {
                                field: name(),
                                minimum: min.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    out
}

/// Error strings for `payload`; empty means valid.
pub fn validate(payload: &Map<String, Value>, contract: &ContractDocument) -> Vec<String> {
    check(payload, contract).iter().map(ToString::to_string).collect()
}

/// Non-empty batch of violations, reported together.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationErrors {
    pub contract: String,
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.violations.len();
        write!(
            f,
            "contract violation ({}, {n} error{}): {}",
            self.contract,
            if n == 1 { "" } else { "s" },
            self.messages().join("; ")
        )
    }
}

impl std::error::Error for ValidationErrors {}
