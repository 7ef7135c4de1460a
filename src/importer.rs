use std::path::{Path, PathBuf};

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::db::{self, ImportRecord, InsertOutcome};
use crate::error::Result;
use crate::readers::ReaderKind;
use crate::settings::Settings;

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub duplicate_file: bool,
}

/// Import one statement file. `Ok(None)` when the file is not a statement
/// and was skipped. The whole file lands in one database transaction.
pub fn import_file(
    conn: &Connection,
    file_path: &Path,
    settings: &Settings,
    ignore_duplicates: bool,
) -> Result<Option<ImportResult>> {
    let Some(kind) = ReaderKind::for_path(file_path)? else {
        return Ok(None);
    };

    let checksum = compute_checksum(file_path)?;
    if db::import_exists(conn, &checksum)? {
        debug!("{} was already imported", file_path.display());
        return Ok(Some(ImportResult {
            duplicate_file: true,
            ..Default::default()
        }));
    }

    let statement = kind.read(file_path, settings)?;
    if statement.transactions.is_empty() {
        info!("No transactions in {}", file_path.display());
    }

    let tx = conn.unchecked_transaction()?;
    if !db::account_exists(&tx, &statement.account_id)? {
        info!("New account {} ({})", statement.account_id, kind.key());
        db::insert_account(&tx, &statement.account_id, kind.key(), None)?;
    }

    let mut result = ImportResult::default();
    for t in &statement.transactions {
        match db::insert_transaction(&tx, t, ignore_duplicates)? {
            InsertOutcome::Inserted => result.imported += 1,
            InsertOutcome::AlreadyExists => result.skipped += 1,
        }
    }

    db::record_import(
        &tx,
        &ImportRecord {
            filename: file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            account_id: &statement.account_id,
            record_count: statement.transactions.len(),
            from_date: statement.from_date,
            to_date: statement.to_date,
            checksum: &checksum,
        },
    )?;
    tx.commit()?;

    info!(
        "{}: {} imported, {} already stored ({}, {} to {})",
        file_path.display(),
        result.imported,
        result.skipped,
        kind.name(),
        statement.from_date,
        statement.to_date
    );
    Ok(Some(result))
}

// ---------------------------------------------------------------------------
// Directory import
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub files: usize,
    pub imported: usize,
    pub skipped: usize,
    pub duplicate_files: usize,
    pub ignored_files: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    fn add(&mut self, result: ImportResult) {
        self.files += 1;
        self.imported += result.imported;
        self.skipped += result.skipped;
        if result.duplicate_file {
            self.duplicate_files += 1;
        }
    }
}

/// Every file below `dir`, depth first, in name order.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::result::Result<_, _>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Import every statement below `dir`. A file that fails is logged and
/// counted; the rest of the tree is still imported.
pub fn import_dir(conn: &Connection, dir: &Path, settings: &Settings, ignore_duplicates: bool) -> Result<BatchSummary> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;

    let mut summary = BatchSummary::default();
    for path in files {
        match import_file(conn, &path, settings, ignore_duplicates) {
            Ok(Some(result)) => summary.add(result),
            Ok(None) => summary.ignored_files += 1,
            Err(e) => {
                error!("Failed to import {}: {e}", path.display());
                summary.failed.push((path, e.to_string()));
            }
        }
    }
    Ok(summary)
}
