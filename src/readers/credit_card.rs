//! Tab-separated credit card report. The export pads its columns with runs of
//! tabs and spaces, opens with a card-number line and separates sections
//! with dashed rules, so it needs a cleanup pass before delimiter parsing.

use csv::StringRecord;
use tracing::error;

use super::StatementReader;
use crate::error::{Result, TallyError};
use crate::models::{Statement, Transaction};
use crate::parse::{collapse_spaces, collapse_tabs, decode_utf8, normalize, parse_amount, parse_date};

const DELIMITER: u8 = b'\t';
const DATE_FORMATS: &[&str] = &["%Y-%m-%d"];

const COL_CARD_NO: &str = "Card no.";
const COL_DATE: &str = "Date";
const COL_DESCRIPTION: &str = "Description";
const COL_MONEY_IN: &str = "Money in";
const COL_MONEY_OUT: &str = "Money out";

pub struct CreditCardReader {
    card_last_digits: String,
}

struct Columns {
    card_no: usize,
    date: usize,
    description: usize,
    money_in: usize,
    money_out: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| TallyError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            card_no: find(COL_CARD_NO)?,
            date: find(COL_DATE)?,
            description: find(COL_DESCRIPTION)?,
            money_in: find(COL_MONEY_IN)?,
            money_out: find(COL_MONEY_OUT)?,
        })
    }
}

impl CreditCardReader {
    pub fn new(card_last_digits: &str) -> Self {
        Self {
            card_last_digits: card_last_digits.to_string(),
        }
    }

    pub fn account_id(&self) -> String {
        format!("santander_credit_card_xx_{}", self.card_last_digits)
    }

    fn check_card_number(&self, raw: &str) -> Result<()> {
        let chars: Vec<char> = raw.trim_end().chars().collect();
        let last: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        if last == self.card_last_digits {
            Ok(())
        } else {
            Err(TallyError::StatementParse(format!("unexpected card number: {last}")))
        }
    }

    /// Validate the card line and strip the export's padding. The header row
    /// has every tab run collapsed; data rows have tab pairs collapsed so an
    /// empty column, padded as a doubled pair, survives as an empty field.
    fn clean_input(&self, text: &str) -> Result<String> {
        let mut lines = text.lines();
        match lines.next() {
            Some(card_line) => self.check_card_number(card_line)?,
            None => return Err(TallyError::StatementParse("empty credit card report".to_string())),
        }

        let mut cleaned = String::with_capacity(text.len());
        let mut seen_header = false;
        for line in lines {
            if line.replace('-', "").trim().is_empty() {
                continue;
            }
            let line = if seen_header {
                line.replace("\t\t", "\t")
            } else {
                seen_header = true;
                collapse_tabs(line)
            };
            cleaned.push_str(&collapse_spaces(&line));
            cleaned.push('\n');
        }
        Ok(cleaned)
    }

    fn create_transaction(&self, record: &StringRecord, cols: &Columns) -> Result<Transaction> {
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let card_no = field(cols.card_no);
        if !card_no.is_empty() {
            self.check_card_number(card_no)?;
        }

        let money_in = field(cols.money_in);
        let amount = if !money_in.is_empty() {
            -parse_amount(money_in)?
        } else {
            parse_amount(field(cols.money_out))?
        };

        Ok(Transaction::new(
            parse_date(field(cols.date), DATE_FORMATS)?,
            normalize(field(cols.description)),
            amount,
            self.account_id(),
        ))
    }
}

impl StatementReader for CreditCardReader {
    fn produce(&self, source: &[u8]) -> Result<Statement> {
        let cleaned = self.clean_input(&decode_utf8(source)?)?;
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(cleaned.as_bytes());
        let cols = Columns::locate(rdr.headers()?)?;

        let mut transactions = Vec::new();
        for result in rdr.records() {
            let record = result?;
            match self.create_transaction(&record, &cols) {
                Ok(t) => transactions.push(t),
                Err(e) => {
                    error!("Issue creating a transaction from row {:?}: {e}", record.iter().collect::<Vec<_>>());
                    return Err(e);
                }
            }
        }

        Statement::spanning(self.account_id(), transactions)
            .ok_or_else(|| TallyError::StatementParse("credit card report contains no transactions".to_string()))
    }
}
