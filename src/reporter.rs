use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::categorizer::Categorizer;
use crate::error::{Result, TallyError};
use crate::models::{ProcessedTransaction, Statement};
use crate::readers::ReaderKind;

pub const REPORT_FILE: &str = "report.csv";

/// One line of the report file. Field order is the column order.
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    description: &'a str,
    amount: String,
    category: &'a str,
    sub_category: &'a str,
    date: String,
    is_household_expense: &'static str,
    bank_category: &'a str,
}

impl<'a> From<&'a ProcessedTransaction> for ReportRow<'a> {
    fn from(p: &'a ProcessedTransaction) -> Self {
        Self {
            description: &p.transaction.description,
            amount: p.transaction.amount.to_string(),
            category: p.category.as_deref().unwrap_or(""),
            sub_category: p.sub_category.as_deref().unwrap_or(""),
            date: p.transaction.date.format("%Y-%m-%d").to_string(),
            is_household_expense: match p.is_household_expense() {
                Some(true) => "Yes",
                Some(false) => "No",
                None => "",
            },
            bank_category: p.transaction.bank_category.as_deref().unwrap_or(""),
        }
    }
}

/// Combines the statements of one reporting period.
pub struct StatementReporter {
    statements: Vec<Statement>,
}

impl StatementReporter {
    /// Every statement strictly between the first and the last must cover the
    /// same period as the first one. Only the last may cover a different
    /// period.
    pub fn new(statements: Vec<Statement>) -> Result<Self> {
        if let Some((first, rest)) = statements.split_first() {
            let middle = &rest[..rest.len().saturating_sub(1)];
            for s in middle {
                if s.from_date != first.from_date {
                    return Err(TallyError::Validation(format!(
                        "expected statement start {}, got {} ({})",
                        first.from_date, s.from_date, s.account_id
                    )));
                }
                if s.to_date != first.to_date {
                    return Err(TallyError::Validation(format!(
                        "expected statement end {}, got {} ({})",
                        first.to_date, s.to_date, s.account_id
                    )));
                }
            }
        }
        Ok(Self { statements })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Categorized transactions of every statement, in input order, minus
    /// the ignored ones.
    pub fn report(&self, categorizer: &Categorizer) -> Result<Vec<ProcessedTransaction>> {
        let mut report = Vec::new();
        for statement in &self.statements {
            for t in &statement.transactions {
                if categorizer.should_ignore(t) {
                    warn!("Ignoring {t}");
                    continue;
                }
                report.push(categorizer.categorize(t));
            }
        }
        if report.is_empty() {
            return Err(TallyError::EmptyReport);
        }
        Ok(report)
    }

    pub fn write_csv<W: Write>(&self, categorizer: &Categorizer, writer: W) -> Result<usize> {
        let report = self.report(categorizer)?;
        let mut wtr = csv::Writer::from_writer(writer);
        for p in &report {
            wtr.serialize(ReportRow::from(p))?;
        }
        wtr.flush()?;
        Ok(report.len())
    }

    /// Nothing is written when the report turns out empty.
    pub fn store_csv(&self, categorizer: &Categorizer, path: &Path) -> Result<usize> {
        let mut buf = Vec::new();
        let written = self.write_csv(categorizer, &mut buf)?;
        std::fs::write(path, buf)?;
        Ok(written)
    }
}

/// Statement files of one month directory in reporting order: bank
/// statements, then credit card reports, then payment app exports, each group
/// sorted by file name. Skipped files are left out; unrecognized ones fail.
pub fn month_statement_paths(dir: &Path) -> Result<Vec<(ReaderKind, PathBuf)>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::result::Result<_, _>>()?;
    entries.retain(|p| p.is_file());
    entries.sort();

    let mut found = Vec::new();
    for path in entries {
        if let Some(kind) = ReaderKind::for_path(&path)? {
            found.push((kind, path));
        }
    }
    found.sort_by_key(|(kind, _)| kind_order(*kind));
    Ok(found)
}

fn kind_order(kind: ReaderKind) -> u8 {
    match kind {
        ReaderKind::FixedToken => 0,
        ReaderKind::CreditCard => 1,
        ReaderKind::MultiDelimiter => 2,
    }
}
