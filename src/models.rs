use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// `(date, description, amount)`. Deliberately excludes the account: the same
/// real-world transaction seen through two statements collapses to one record.
pub type PrimaryKey = (NaiveDate, String, Decimal);

/// Canonical transaction shared by every reader. Outflows are positive,
/// inflows negative.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub account_id: String,
    pub is_shared_expense: bool,
    pub bank_category: Option<String>,
    pub added_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: impl Into<String>, amount: Decimal, account_id: impl Into<String>) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            account_id: account_id.into(),
            is_shared_expense: false,
            bank_category: None,
            added_on: None,
            updated_on: None,
        }
    }

    pub fn primary_key(&self) -> PrimaryKey {
        (self.date, self.description.clone(), self.amount)
    }

    pub fn same_primary_key(&self, other: &Transaction) -> bool {
        self.date == other.date && self.description == other.description && self.amount == other.amount
    }

    /// Equal on every field except the audit timestamps.
    pub fn similar(&self, other: &Transaction) -> bool {
        self.same_primary_key(other)
            && self.account_id == other.account_id
            && self.is_shared_expense == other.is_shared_expense
            && self.bank_category == other.bank_category
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.same_primary_key(other)
    }
}

impl Eq for Transaction {}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} [{}]", self.date, self.description, self.amount, self.account_id)
    }
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub account_id: String,
    pub transactions: Vec<Transaction>,
}

impl Statement {
    /// Build a statement whose period is the span of its transaction dates.
    /// Returns `None` when there are no transactions to span.
    pub fn spanning(account_id: impl Into<String>, transactions: Vec<Transaction>) -> Option<Self> {
        let from_date = transactions.iter().map(|t| t.date).min()?;
        let to_date = transactions.iter().map(|t| t.date).max()?;
        Some(Self {
            from_date,
            to_date,
            account_id: account_id.into(),
            transactions,
        })
    }

    pub fn out_of_period(&self) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.date < self.from_date || t.date > self.to_date)
            .collect()
    }
}

/// A transaction after rule-based categorization.
#[derive(Debug, Clone)]
pub struct ProcessedTransaction {
    pub transaction: Transaction,
    pub category: Option<String>,
    pub sub_category: Option<String>,
}

pub const HOUSEHOLD_CATEGORIES: &[&str] = &["Household essentials", "Household nice-to-haves"];

impl ProcessedTransaction {
    /// `None` when no category could be resolved at all.
    pub fn is_household_expense(&self) -> Option<bool> {
        self.category
            .as_deref()
            .map(|c| HOUSEHOLD_CATEGORIES.contains(&c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFeatureName {
    ShortDescription,
}

impl TextFeatureName {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ShortDescription => "short_description",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "short_description" => Some(Self::ShortDescription),
            _ => None,
        }
    }
}

pub const MANUAL_ORIGIN: &str = "manual";

/// Annotation attached to a transaction by primary key. Not unique: the same
/// feature may be recorded more than once.
#[derive(Debug, Clone)]
pub struct TextFeature {
    pub name: TextFeatureName,
    pub transaction_id: PrimaryKey,
    pub value: String,
    pub origin: String,
    pub added_on: Option<NaiveDateTime>,
}

impl TextFeature {
    pub fn similar(&self, other: &TextFeature) -> bool {
        self.name == other.name
            && self.transaction_id == other.transaction_id
            && self.value == other.value
            && self.origin == other.origin
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub account_type: String,
    pub metadata: Option<String>,
    pub added_on: Option<NaiveDateTime>,
}
