use std::fmt;

use serde::Deserialize;
use serde_json::{Number, Value};

/// Why a contract document failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    InvalidJson(String),
    MissingFields,
    FieldsNotObject,
    Field { name: String, reason: String },
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::InvalidJson(e) => write!(f, "invalid json: {e}"),
            DocumentError::MissingFields => write!(f, "contract has no 'fields' object"),
            DocumentError::FieldsNotObject => write!(f, "contract 'fields' must be an object"),
            DocumentError::Field { name, reason } => write!(f, "field '{name}': {reason}"),
        }
    }
}

impl std::error::Error for DocumentError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
}

/// One check applied to one payload field.
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    /// Field must be present.
    Required,
    /// If present, must be a JSON string.
    TypeString,
    /// If present, must be a JSON number (integer or float).
    TypeNumber,
    /// If present and numeric, must be `>=` the bound. Kept as the document's
    /// own number so error text shows it as written.
    Minimum(Number),
}

/// Compiled rules for one field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRules {
    pub name: String,
    pub rules: Vec<Rule>,
}

/// Field rules in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContractDocument {
    pub fields: Vec<FieldRules>,
}

#[derive(Deserialize)]
struct RawFieldSpec {
    #[serde(default)]
    required: bool,
    #[serde(rename = "type", default)]
    field_type: Option<FieldType>,
    #[serde(default)]
    minimum: Option<Number>,
}

impl RawFieldSpec {
    /// `minimum` only takes effect together with `type: number`.
    fn compile(self, name: &str) -> FieldRules {
        let mut rules = Vec::new();
        if self.required {
            rules.push(Rule::Required);
        }
        match self.field_type {
            Some(FieldType::String) => rules.push(Rule::TypeString),
            Some(FieldType::Number) => {
                rules.push(Rule::TypeNumber);
                if let Some(min) = self.minimum {
                    rules.push(Rule::Minimum(min));
                }
            }
            None => {}
        }
        FieldRules {
            name: name.to_string(),
            rules,
        }
    }
}

impl ContractDocument {
    pub fn from_json_str(raw: &str) -> Result<Self, DocumentError> {
        let v: Value =
            serde_json::from_str(raw).map_err(|e| DocumentError::InvalidJson(e.to_string()))?;
        Self::from_value(&v)
    }

    pub fn from_value(v: &Value) -> Result<Self, DocumentError> {
        let fields = v
            .get("fields")
            .ok_or(DocumentError::MissingFields)?
            .as_object()
            .ok_or(DocumentError::FieldsNotObject)?;

        let mut out = Vec::with_capacity(fields.len());
        for (name, spec) in fields {
            let raw: RawFieldSpec = serde_json::from_value(spec.clone())
                .map_err(|e| DocumentError::Field {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            out.push(raw.compile(name));
        }
        Ok(Self { fields: out })
    }

    pub fn field(&self, name: &str) -> Option<&FieldRules> {
        self.fields.iter().find(|f| f.name == name)
    }
}
