use comfy_table::{Cell, CellAlignment, Table};
use rust_decimal::Decimal;

use crate::cli::open_db;
use crate::db::{get_transaction, get_transactions, update_transaction};
use crate::error::{Result, TallyError};
use crate::models::{PrimaryKey, Transaction};
use crate::parse::{parse_amount, parse_date};
use crate::settings::load_settings;

/// Primary key from command-line arguments.
pub(crate) fn parse_key(date: &str, description: &str, amount: &str) -> Result<PrimaryKey> {
    Ok((parse_date(date, &["%Y-%m-%d"])?, description.to_string(), parse_amount(amount)?))
}

pub fn list(account: Option<&str>) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let transactions = get_transactions(&conn, account)?;

    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Amount", "Account", "Shared", "Bank Category", "Added", "Updated"]);
    let mut total = Decimal::ZERO;
    for t in &transactions {
        total += t.amount;
        table.add_row(vec![
            Cell::new(t.date),
            Cell::new(&t.description),
            Cell::new(t.amount).set_alignment(CellAlignment::Right),
            Cell::new(&t.account_id),
            Cell::new(if t.is_shared_expense { "yes" } else { "" }),
            Cell::new(t.bank_category.as_deref().unwrap_or("")),
            Cell::new(t.added_on.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(t.updated_on.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Transactions\n{table}");
    println!("{} transactions, net outflow {total}", transactions.len());
    Ok(())
}

pub fn update(date: &str, description: &str, amount: &str, account: Option<&str>, shared: Option<bool>) -> Result<()> {
    let key = parse_key(date, description, amount)?;
    let conn = open_db(&load_settings())?;
    let target = Transaction::new(key.0, key.1.clone(), key.2, "");

    if !update_transaction(&conn, &target, account, shared)? {
        return Err(TallyError::Validation(format!("no stored transaction {} {} {}", key.0, key.1, key.2)));
    }
    if let Some(t) = get_transaction(&conn, &key)? {
        println!(
            "Updated {t}{}",
            if t.is_shared_expense { " (shared)" } else { "" }
        );
    }
    Ok(())
}
