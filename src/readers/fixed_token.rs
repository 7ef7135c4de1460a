//! Legacy bank export made of `Token: value` lines.
//!
//! ```text
//! From: 01/09/2023 to 30/09/2023
//! Account: XXXX XXXX XXXX 4627
//! Date: 04/09/2023
//! Description: CARD PAYMENT TO TESCO STORES
//! Amount: -23.10
//! Balance: 1042.77
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::StatementReader;
use crate::error::{Result, TallyError};
use crate::models::{Statement, Transaction};
use crate::parse::{decode_iso_8859_15, normalize, parse_amount, parse_date};

const DATE_FORMATS: &[&str] = &["%d/%m/%Y"];
const DATE_SPLITTER: &str = "to";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    FromTo,
    Account,
    Date,
    Description,
    Amount,
    Balance,
}

impl Token {
    fn from_label(label: &str) -> Option<Token> {
        match label {
            "From" => Some(Self::FromTo),
            "Account" => Some(Self::Account),
            "Date" => Some(Self::Date),
            "Description" => Some(Self::Description),
            "Amount" => Some(Self::Amount),
            "Balance" => Some(Self::Balance),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Value {
    Period(NaiveDate, NaiveDate),
    Text(String),
    Date(NaiveDate),
    Amount(Decimal),
}

pub struct FixedTokenReader {
    account_id: String,
}

impl FixedTokenReader {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    /// Resolve the account from the account number embedded in the file name.
    pub fn for_file(path: &Path, account_map: &BTreeMap<String, String>) -> Result<Self> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        account_map
            .iter()
            .find(|(number, _)| stem.contains(number.as_str()))
            .map(|(_, account_id)| Self::new(account_id.clone()))
            .ok_or_else(|| {
                TallyError::StatementParse(format!(
                    "did not find any of the account numbers {:?} in the file name '{}'",
                    account_map.keys().collect::<Vec<_>>(),
                    path.display()
                ))
            })
    }
}

impl StatementReader for FixedTokenReader {
    fn produce(&self, source: &[u8]) -> Result<Statement> {
        let text = decode_iso_8859_15(source);
        let mut tokens = Vec::new();
        for line in text.lines() {
            if let Some((token, raw)) = tokenize_line(line)? {
                tokens.push((token, parse_value(token, raw)?));
            }
        }

        let mut iter = tokens.into_iter();
        let (from_date, to_date) = match iter.next() {
            Some((Token::FromTo, Value::Period(from, to))) => (from, to),
            other => {
                return Err(TallyError::StatementParse(format!(
                    "expected the statement to open with a From line, found {other:?}"
                )))
            }
        };
        match iter.next() {
            Some((Token::Account, Value::Text(number))) => debug!("Reading account {number} as {}", self.account_id),
            other => {
                return Err(TallyError::StatementParse(format!(
                    "expected an Account line after the period, found {other:?}"
                )))
            }
        }

        let rest: Vec<(Token, Value)> = iter.collect();
        if rest.len() % 4 != 0 {
            return Err(TallyError::StatementParse(format!(
                "{} transaction lines do not form complete Date/Description/Amount/Balance groups",
                rest.len()
            )));
        }

        let mut transactions = Vec::with_capacity(rest.len() / 4);
        for group in rest.chunks_exact(4) {
            match group {
                [(Token::Date, Value::Date(date)), (Token::Description, Value::Text(description)), (Token::Amount, Value::Amount(amount)), (Token::Balance, Value::Amount(_))] =>
                {
                    // Source amounts are credit-positive; canonical is outflow-positive.
                    transactions.push(Transaction::new(*date, description.clone(), -*amount, self.account_id.clone()));
                }
                _ => {
                    let found: Vec<Token> = group.iter().map(|(t, _)| *t).collect();
                    return Err(TallyError::StatementParse(format!(
                        "expected Date, Description, Amount, Balance but found {found:?}"
                    )));
                }
            }
        }

        let statement = Statement {
            from_date,
            to_date,
            account_id: self.account_id.clone(),
            transactions,
        };
        for t in statement.out_of_period() {
            warn!("Transaction {t} falls outside the statement period {from_date} to {to_date}");
        }
        Ok(statement)
    }
}

/// Split on the first colon. Lines without one carry no token and are skipped.
fn tokenize_line(line: &str) -> Result<Option<(Token, &str)>> {
    let Some((label, raw)) = line.split_once(':') else {
        return Ok(None);
    };
    match Token::from_label(&normalize(label)) {
        Some(token) => Ok(Some((token, raw))),
        None => Err(TallyError::StatementParse(format!("unrecognised token on line: {line}"))),
    }
}

fn parse_value(token: Token, raw: &str) -> Result<Value> {
    Ok(match token {
        Token::FromTo => {
            let (from, to) = parse_from_to(raw)?;
            Value::Period(from, to)
        }
        Token::Account | Token::Description => Value::Text(normalize(raw)),
        Token::Date => Value::Date(parse_date(&normalize(raw), DATE_FORMATS)?),
        Token::Amount | Token::Balance => Value::Amount(parse_amount(raw)?),
    })
}

/// `01/09/2023 to 30/09/2023`, with arbitrary whitespace.
fn parse_from_to(raw: &str) -> Result<(NaiveDate, NaiveDate)> {
    let compact: String = normalize(raw).chars().filter(|c| !c.is_whitespace()).collect();
    let parts: Vec<&str> = compact.split(DATE_SPLITTER).collect();
    match parts.as_slice() {
        [from, to] => Ok((parse_date(from, DATE_FORMATS)?, parse_date(to, DATE_FORMATS)?)),
        _ => Err(TallyError::StatementParse(format!(
            "expected a period of the form '<date> to <date>', found '{}'",
            raw.trim()
        ))),
    }
}
