//! Durable CSV form of the master identity set and of attributed orders.

use std::fs;
use std::io::Write;
use std::path::Path;

use cih_schemas::{AttributedOrder, MasterIdentity};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::flat::{read_flat_records, read_flat_records_from_path, FlatTable};
use crate::SourceError;

const MASTER_HEADER: [&str; 6] = ["global_id", "crm_id", "ecommerce_id", "email", "name", "phone"];

const ATTRIBUTED_HEADER: [&str; 5] = [
    "order_id",
    "global_id",
    "total_amount",
    "path",
    "conflicting_global_id",
];

fn opt_str(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("")
}

fn opt_uuid(v: &Option<Uuid>) -> String {
    v.map(|u| u.to_string()).unwrap_or_default()
}

fn write_master<W: Write>(w: W, identities: &[MasterIdentity]) -> Result<(), SourceError> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(MASTER_HEADER)?;
    for m in identities {
        wtr.write_record([
            m.global_id.to_string().as_str(),
            opt_str(&m.crm_id),
            opt_str(&m.ecommerce_id),
            opt_str(&m.email),
            opt_str(&m.name),
            opt_str(&m.phone),
        ])?;
    }
    wtr.flush().map_err(|e| SourceError::Io(e.to_string()))?;
    Ok(())
}

fn write_attributed<W: Write>(w: W, orders: &[AttributedOrder]) -> Result<(), SourceError> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(ATTRIBUTED_HEADER)?;
    for o in orders {
        wtr.write_record([
            o.order_id.clone(),
            opt_uuid(&o.global_id),
            o.total_amount.to_string(),
            o.path.as_str().to_string(),
            opt_uuid(&o.conflicting_global_id),
        ])?;
    }
    wtr.flush().map_err(|e| SourceError::Io(e.to_string()))?;
    Ok(())
}

/// Write through a sibling temp file renamed over `path`, so a failed write
/// leaves the previous file intact.
fn replace_file<F>(path: &Path, write: F) -> Result<(), SourceError>
where
    F: FnOnce(&mut fs::File) -> Result<(), SourceError>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| SourceError::Io(format!("create_dir_all '{}': {e}", parent.display())))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| SourceError::Io(format!("create temp file in '{}': {e}", parent.display())))?;
    write(tmp.as_file_mut())?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| SourceError::Io(format!("sync '{}': {e}", tmp.path().display())))?;
    tmp.persist(path)
        .map_err(|e| SourceError::Io(format!("replace '{}': {}", path.display(), e.error)))?;
    Ok(())
}

fn into_utf8(buf: Vec<u8>) -> Result<String, SourceError> {
    String::from_utf8(buf).map_err(|e| SourceError::Csv(e.to_string()))
}

pub fn master_to_csv_string(identities: &[MasterIdentity]) -> Result<String, SourceError> {
    let mut buf = Vec::new();
    write_master(&mut buf, identities)?;
    into_utf8(buf)
}

/// Replace `path` with the full master set, creating parent directories.
pub fn write_master_csv(path: &Path, identities: &[MasterIdentity]) -> Result<(), SourceError> {
    replace_file(path, |f| write_master(f, identities))?;
    debug!(path = %path.display(), identities = identities.len(), "wrote master identity set");
    Ok(())
}

pub fn attributed_to_csv_string(orders: &[AttributedOrder]) -> Result<String, SourceError> {
    let mut buf = Vec::new();
    write_attributed(&mut buf, orders)?;
    into_utf8(buf)
}

pub fn write_attributed_csv(path: &Path, orders: &[AttributedOrder]) -> Result<(), SourceError> {
    replace_file(path, |f| write_attributed(f, orders))?;
    debug!(path = %path.display(), orders = orders.len(), "wrote attributed orders");
    Ok(())
}

fn master_from_table(table: &FlatTable) -> Result<Vec<MasterIdentity>, SourceError> {
    if table.headers.is_empty() {
        return Ok(Vec::new());
    }
    table.require(&["global_id"])?;

    let cell = |rec: &crate::FlatRecord, col: &str| rec.get(col).filter(|v| !v.is_empty()).cloned();

    let mut out = Vec::with_capacity(table.rows.len());
    for (line, rec) in table.numbered_rows() {
        let raw = rec.get("global_id").cloned().unwrap_or_default();
        let global_id = Uuid::parse_str(&raw).map_err(|_| SourceError::ParseField {
            row: line,
            field: "global_id",
            raw: raw.clone(),
        })?;

        let identity = MasterIdentity {
            global_id,
            crm_id: cell(rec, "crm_id"),
            ecommerce_id: cell(rec, "ecommerce_id"),
            email: cell(rec, "email"),
            name: cell(rec, "name"),
            phone: cell(rec, "phone"),
        };

        if !identity.has_signal() {
            warn!(global_id = %identity.global_id, row = line, "master row has no identifying signal; skipped");
            continue;
        }
        out.push(identity);
    }
    Ok(out)
}

pub fn parse_master_csv_str(src: &str) -> Result<Vec<MasterIdentity>, SourceError> {
    master_from_table(&read_flat_records(src.as_bytes())?)
}

pub fn load_master_csv(path: &Path) -> Result<Vec<MasterIdentity>, SourceError> {
    master_from_table(&read_flat_records_from_path(path)?)
}
