use std::path::PathBuf;

use crate::cli::open_db;
use crate::error::{Result, TallyError};
use crate::importer::{import_dir, import_file};
use crate::settings::{load_settings, shellexpand_path};

pub fn run(path: &str, strict: bool) -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let path = PathBuf::from(shellexpand_path(path));
    let ignore_duplicates = settings.ignore_duplicates && !strict;

    if path.is_dir() {
        let summary = import_dir(&conn, &path, &settings, ignore_duplicates)?;
        println!(
            "{} files: {} imported, {} skipped (duplicates), {} files already imported, {} not statements",
            summary.files, summary.imported, summary.skipped, summary.duplicate_files, summary.ignored_files
        );
        if !summary.failed.is_empty() {
            for (file, reason) in &summary.failed {
                println!("  failed: {}: {reason}", file.display());
            }
            return Err(TallyError::Other(format!("{} files failed to import", summary.failed.len())));
        }
        return Ok(());
    }

    match import_file(&conn, &path, &settings, ignore_duplicates)? {
        None => println!("{} is not a statement file, skipped.", path.display()),
        Some(result) if result.duplicate_file => {
            println!("This file has already been imported (duplicate checksum).")
        }
        Some(result) => println!("{} imported, {} skipped (duplicates)", result.imported, result.skipped),
    }
    Ok(())
}
