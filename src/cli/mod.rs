pub mod accounts;
pub mod features;
pub mod import;
pub mod init;
pub mod report;
pub mod rules;
pub mod transactions;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{Result, TallyError};
use crate::settings::Settings;

/// Open the configured database, refusing to create one outside `tally init`.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(TallyError::Settings(format!(
            "No database found at {}\nRun `tally init` to create one.",
            db_path.display()
        )));
    }
    get_connection(&db_path)
}

/// `YYYY-MM` to the first day of that month.
pub(crate) fn parse_month(month: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map_err(|_| TallyError::Validation(format!("expected a month as YYYY-MM, got '{month}'")))
}

#[derive(Parser)]
#[command(name = "tally", about = "Import bank statements, categorize them and build monthly reports.")]
pub struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for tally data (default: ~/Documents/tally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a statement file, or every statement below a directory.
    Import {
        /// Statement file or directory
        path: String,
        /// Fail on transactions that are already stored
        #[arg(long)]
        strict: bool,
    },
    /// Build the categorized report for one month of statements.
    Report {
        /// Month: YYYY-MM (default: last month)
        #[arg(long)]
        month: Option<String>,
        /// Statement directory (default: <finances_dir>/<YEAR>/<MonthName>)
        #[arg(long)]
        dir: Option<String>,
        /// Output file (default: report.csv in the statement directory)
        #[arg(long)]
        output: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Inspect and edit stored transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Record text features against stored transactions.
    Features {
        #[command(subcommand)]
        command: FeaturesCommands,
    },
    /// Inspect the categorization rule files.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account id, e.g. 'santander_basic'
        id: String,
        /// Account type: bank_statement, credit_card, payment_app, ...
        #[arg(long = "type")]
        account_type: String,
        /// Free-form JSON metadata
        #[arg(long)]
        metadata: Option<String>,
    },
    /// List all accounts.
    List,
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List stored transactions.
    List {
        /// Only this account
        #[arg(long)]
        account: Option<String>,
    },
    /// Change the account or shared-expense flag of a stored transaction.
    Update {
        /// Date: YYYY-MM-DD
        date: String,
        /// Description exactly as stored
        description: String,
        /// Amount as stored (outflows positive)
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Move to this account
        #[arg(long)]
        account: Option<String>,
        /// Mark as shared (true/false)
        #[arg(long)]
        shared: Option<bool>,
    },
}

#[derive(Subcommand)]
pub enum FeaturesCommands {
    /// Attach a short description to a stored transaction.
    Add {
        /// Date: YYYY-MM-DD
        date: String,
        /// Description exactly as stored
        description: String,
        /// Amount as stored (outflows positive)
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Feature value
        value: String,
        /// Where the value came from
        #[arg(long, default_value = crate::models::MANUAL_ORIGIN)]
        origin: String,
    },
    /// List recorded features.
    List,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Load the rule files and report what they contain.
    Check {
        /// Also categorize this description
        #[arg(long)]
        description: Option<String>,
        /// Bank category to categorize with
        #[arg(long = "bank-category")]
        bank_category: Option<String>,
    },
}
