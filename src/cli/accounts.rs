use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::db::{get_accounts, insert_account};
use crate::error::{Result, TallyError};
use crate::settings::load_settings;

pub fn add(id: &str, account_type: &str, metadata: Option<&str>) -> Result<()> {
    if let Some(json) = metadata {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|e| TallyError::Validation(format!("metadata is not valid JSON: {e}")))?;
    }
    let conn = open_db(&load_settings())?;
    insert_account(&conn, id, account_type, metadata)?;
    println!("Added account: {id}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let accounts = get_accounts(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Type", "Metadata", "Added"]);
    for a in accounts {
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(a.account_type),
            Cell::new(a.metadata.unwrap_or_default()),
            Cell::new(a.added_on.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
