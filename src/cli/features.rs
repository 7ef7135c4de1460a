use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::cli::transactions::parse_key;
use crate::db::{get_text_features, insert_text_feature, transaction_exists};
use crate::error::{Result, TallyError};
use crate::models::{TextFeature, TextFeatureName};
use crate::settings::load_settings;

pub fn add(date: &str, description: &str, amount: &str, value: &str, origin: &str) -> Result<()> {
    let key = parse_key(date, description, amount)?;
    let conn = open_db(&load_settings())?;
    if !transaction_exists(&conn, &key)? {
        return Err(TallyError::Validation(format!("no stored transaction {} {} {}", key.0, key.1, key.2)));
    }

    let feature = TextFeature {
        name: TextFeatureName::ShortDescription,
        transaction_id: key,
        value: value.to_string(),
        origin: origin.to_string(),
        added_on: None,
    };
    let existing = get_text_features(&conn, Some(&feature.transaction_id))?;
    if existing.iter().any(|f| f.similar(&feature)) {
        println!("Note: the same feature was already recorded for this transaction");
    }
    insert_text_feature(&conn, &feature)?;
    println!("Recorded short description '{value}' for '{description}'");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let features = get_text_features(&conn, None)?;

    let mut table = Table::new();
    table.set_header(vec!["Feature", "Date", "Description", "Amount", "Value", "Origin", "Added"]);
    for f in features {
        let (date, description, amount) = f.transaction_id;
        table.add_row(vec![
            Cell::new(f.name.key()),
            Cell::new(date),
            Cell::new(description),
            Cell::new(amount),
            Cell::new(f.value),
            Cell::new(f.origin),
            Cell::new(f.added_on.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Text features\n{table}");
    Ok(())
}
