use comfy_table::{Cell, Table};

use crate::categorizer::Categorizer;
use crate::error::Result;
use crate::models::Transaction;
use crate::parse::{normalize, normalize_opt};
use crate::rules::RuleTables;
use crate::settings::load_settings;

pub fn check(description: Option<&str>, bank_category: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let dir = settings.rules_dir();
    let rules = RuleTables::load(&dir)?;

    let mut table = Table::new();
    table.set_header(vec!["Table", "Entries"]);
    let counts = [
        ("description regex -> short description", rules.description_rewrites.len()),
        ("short description -> category", rules.short_description_to_category.len()),
        ("short description -> sub-category", rules.short_description_to_sub_category.len()),
        ("sub-category -> category", rules.sub_category_to_category.len()),
        ("bank category -> category", rules.bank_category_to_category.len()),
        ("bank category -> sub-category", rules.bank_category_to_sub_category.len()),
        ("ignored (full)", rules.ignore.full.len()),
        ("ignored (partial)", rules.ignore.partial.len()),
    ];
    for (name, count) in counts {
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    println!("Rules in {}\n{table}", dir.display());

    if let Some(description) = description {
        let categorizer = Categorizer::new(&rules);
        let mut t = Transaction::new(chrono::Local::now().date_naive(), normalize(description), Default::default(), "");
        t.bank_category = normalize_opt(bank_category);

        if categorizer.should_ignore(&t) {
            println!("'{description}' is ignored");
            return Ok(());
        }
        let p = categorizer.categorize(&t);
        println!("Short description: {}", p.transaction.description);
        println!("Sub-category:      {}", p.sub_category.as_deref().unwrap_or("(none)"));
        println!("Category:          {}", p.category.as_deref().unwrap_or("(none)"));
        let household = match p.is_household_expense() {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unknown",
        };
        println!("Household expense: {household}");
    }
    Ok(())
}
