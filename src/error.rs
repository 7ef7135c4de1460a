use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A single date or amount token could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The statement as a whole is structurally malformed.
    #[error("Statement parse error: {0}")]
    StatementParse(String),

    /// An expected column is absent from a delimited statement. Usually means
    /// the wrong delimiter was used.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Unrecognized file: {}", .0.display())]
    UnrecognizedFile(PathBuf),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Report is empty: no transactions left after filtering")]
    EmptyReport,

    #[error("Transaction already exists: {0}")]
    DuplicateTransaction(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
