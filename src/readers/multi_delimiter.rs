//! Payment app CSV export. The delimiter has changed between export
//! versions, so each candidate is tried in turn: a wrong delimiter collapses
//! the header into a single column and the expected columns go missing.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;

use super::StatementReader;
use crate::error::{Result, TallyError};
use crate::models::{Statement, Transaction};
use crate::parse::{decode_utf8, normalize, parse_amount, parse_date};

pub const ACCOUNT_ID: &str = "revolut";
const DATE_FORMATS: &[&str] = &["%d %b %Y", "%Y-%m-%d %H:%M:%S"];

const COL_COMPLETED_DATE: &str = "Completed Date";
const COL_STARTED_DATE: &str = "Started Date";
const COL_DESCRIPTION: &str = "Description";
const COL_REFERENCE: &str = "Reference";
const COL_PAID_OUT: &str = "Paid Out (GBP)";
const COL_PAID_IN: &str = "Paid In (GBP)";
const COL_AMOUNT: &str = "Amount";

type Row<'a> = HashMap<&'a str, String>;

pub struct MultiDelimiterReader {
    delimiters: Vec<String>,
}

impl MultiDelimiterReader {
    pub fn new(delimiters: Vec<String>) -> Self {
        Self { delimiters }
    }

    fn read_with_delimiter(&self, text: &str, delimiter: u8) -> Result<Statement> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = rdr.headers()?.iter().map(normalize).collect();
        if !headers.iter().any(|h| h == COL_COMPLETED_DATE) {
            return Err(TallyError::MissingColumn(COL_COMPLETED_DATE.to_string()));
        }

        let mut transactions = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let row: Row = headers
                .iter()
                .map(String::as_str)
                .zip(record.iter().map(normalize))
                .collect();
            transactions.push(create_transaction(&row)?);
        }

        Statement::spanning(ACCOUNT_ID, transactions)
            .ok_or_else(|| TallyError::StatementParse("payment app export contains no transactions".to_string()))
    }
}

impl StatementReader for MultiDelimiterReader {
    fn produce(&self, source: &[u8]) -> Result<Statement> {
        let text = decode_utf8(source)?;
        let mut failures = Vec::new();

        for delimiter in &self.delimiters {
            let &[byte] = delimiter.as_bytes() else {
                return Err(TallyError::Settings(format!("delimiter '{delimiter}' is not a single byte")));
            };
            match self.read_with_delimiter(&text, byte) {
                Ok(statement) => return Ok(statement),
                Err(e @ TallyError::MissingColumn(_)) => {
                    debug!("Delimiter '{delimiter}' did not fit: {e}");
                    failures.push(format!("delimiter '{delimiter}': {e}"));
                }
                Err(e) => return Err(e),
            }
        }

        Err(TallyError::StatementParse(format!(
            "could not read the statement with any delimiter. Caught: [{}]",
            failures.join("; ")
        )))
    }
}

fn column<'r>(row: &'r Row, name: &str) -> Result<&'r str> {
    row.get(name)
        .map(String::as_str)
        .ok_or_else(|| TallyError::MissingColumn(name.to_string()))
}

fn create_transaction(row: &Row) -> Result<Transaction> {
    // Pending transactions have no completion date yet.
    let completed = column(row, COL_COMPLETED_DATE)?;
    let raw_date = if completed.is_empty() {
        column(row, COL_STARTED_DATE)?
    } else {
        completed
    };
    let date = parse_date(raw_date, DATE_FORMATS)?;

    let description = row
        .get(COL_DESCRIPTION)
        .or_else(|| row.get(COL_REFERENCE))
        .cloned()
        .unwrap_or_default();

    Ok(Transaction::new(date, description, amount(row)?, ACCOUNT_ID))
}

fn amount(row: &Row) -> Result<Decimal> {
    match row.get(COL_PAID_OUT) {
        Some(paid_out) if !paid_out.is_empty() => return parse_amount(paid_out),
        _ => {}
    }
    match row.get(COL_AMOUNT) {
        Some(amount) if !amount.is_empty() => return Ok(-parse_amount(amount)?),
        _ => {}
    }
    Ok(-parse_amount(column(row, COL_PAID_IN)?)?)
}
