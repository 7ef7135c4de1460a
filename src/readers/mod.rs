pub mod credit_card;
pub mod fixed_token;
pub mod multi_delimiter;

use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Result, TallyError};
use crate::models::Statement;
use crate::settings::Settings;

pub use credit_card::CreditCardReader;
pub use fixed_token::FixedTokenReader;
pub use multi_delimiter::MultiDelimiterReader;

/// Turns the raw bytes of one statement file into a `Statement`.
pub trait StatementReader {
    fn produce(&self, source: &[u8]) -> Result<Statement>;
}

// ---------------------------------------------------------------------------
// Reader kinds: enum dispatch, selected by file name
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    FixedToken,
    CreditCard,
    MultiDelimiter,
}

impl ReaderKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::FixedToken => "bank_statement",
            Self::CreditCard => "credit_card",
            Self::MultiDelimiter => "payment_app",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedToken => "Fixed-token bank statement",
            Self::CreditCard => "Tab-delimited credit card report",
            Self::MultiDelimiter => "Payment app CSV export",
        }
    }

    /// Route a file to a reader. `Ok(None)` means the file is a known
    /// non-statement and should be skipped.
    pub fn for_path(path: &Path) -> Result<Option<ReaderKind>> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let stem = path.file_stem().and_then(|n| n.to_str()).unwrap_or("");
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if file_name.starts_with('.') {
            debug!("Skipping {}, hidden file", path.display());
            return Ok(None);
        }
        match extension {
            "txt" if stem.starts_with("Statements") => Ok(Some(Self::FixedToken)),
            "txt" if stem.starts_with("Report") => Ok(Some(Self::CreditCard)),
            "csv" if stem.to_lowercase().starts_with("revolut") => Ok(Some(Self::MultiDelimiter)),
            "csv" | "ods" => {
                debug!("Skipping {}, does not look like a statement", path.display());
                Ok(None)
            }
            _ => Err(TallyError::UnrecognizedFile(path.to_path_buf())),
        }
    }

    pub fn read(&self, path: &Path, settings: &Settings) -> Result<Statement> {
        validate_statement_path(path)?;
        let source = std::fs::read(path)?;
        match self {
            Self::FixedToken => FixedTokenReader::for_file(path, &settings.account_map)?.produce(&source),
            Self::CreditCard => CreditCardReader::new(&settings.card_last_digits).produce(&source),
            Self::MultiDelimiter => MultiDelimiterReader::new(settings.delimiters.clone()).produce(&source),
        }
    }
}

/// Statements live at `.../<YEAR>/<MonthName>/<file>`; reject files whose
/// location does not name a real calendar month.
pub fn validate_statement_path(path: &Path) -> Result<()> {
    let month_dir = path.parent();
    let month = month_dir.and_then(|p| p.file_name()).and_then(|n| n.to_str());
    let year = month_dir
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str());

    let invalid = || {
        TallyError::Validation(format!(
            "expected {} to be stored under <YEAR>/<MonthName>/",
            path.display()
        ))
    };
    let (Some(year), Some(month)) = (year, month) else {
        return Err(invalid());
    };
    let year: i32 = year.parse().map_err(|_| invalid())?;
    NaiveDate::parse_from_str(&format!("{year}-{month}-01"), "%Y-%B-%d").map_err(|_| invalid())?;
    Ok(())
}
