use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ContractDocument;

/// `(name, version)` pair; formats as `<name>_contract_v<version>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractKey {
    pub name: String,
    pub version: u32,
}

impl ContractKey {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Inverse of `Display`. `None` when the string is not a contract key.
    pub fn parse(s: &str) -> Option<Self> {
        let (name, version) = s.trim().rsplit_once("_contract_v")?;
        if name.is_empty() {
            return None;
        }
        let version = version.parse::<u32>().ok()?;
        Some(Self::new(name, version))
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_contract_v{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractLoadError {
    NotFound { key: String, path: PathBuf },
    Io { key: String, reason: String },
    Malformed { key: String, reason: String },
}

impl fmt::Display for ContractLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractLoadError::NotFound { key, path } => {
                write!(f, "contract {key} not found at {}", path.display())
            }
            ContractLoadError::Io { key, reason } => write!(f, "contract {key}: io error: {reason}"),
            ContractLoadError::Malformed { key, reason } => {
                write!(f, "contract {key} is malformed: {reason}")
            }
        }
    }
}

impl std::error::Error for ContractLoadError {}

/// Read and compile a single contract file. The key used in errors is the
/// file stem.
pub fn load_contract(path: &Path) -> Result<ContractDocument, ContractLoadError> {
    let key = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ContractLoadError::NotFound {
            key: key.clone(),
            path: path.to_path_buf(),
        },
        _ => ContractLoadError::Io {
            key: key.clone(),
            reason: e.to_string(),
        },
    })?;

    let doc = ContractDocument::from_json_str(&raw).map_err(|e| ContractLoadError::Malformed {
        key: key.clone(),
        reason: e.to_string(),
    })?;

    debug!(contract = %key, fields = doc.fields.len(), "contract loaded");
    Ok(doc)
}

/// Directory of contract documents, one `<key>.json` per contract.
#[derive(Clone, Debug)]
pub struct ContractRegistry {
    dir: PathBuf,
}

impl ContractRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load by string key, e.g. `order_placed_contract_v1`.
    pub fn load(&self, key: &str) -> Result<ContractDocument, ContractLoadError> {
        if key.trim().is_empty() || key.contains(['/', '\\']) {
            return Err(ContractLoadError::Malformed {
                key: key.to_string(),
                reason: "contract key must be a bare name".to_string(),
            });
        }
        load_contract(&self.path_for(key))
    }

    pub fn load_key(&self, key: &ContractKey) -> Result<ContractDocument, ContractLoadError> {
        self.load(&key.to_string())
    }
}
