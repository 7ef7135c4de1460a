use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate};
use tracing::info;

use crate::categorizer::Categorizer;
use crate::cli::parse_month;
use crate::error::{Result, TallyError};
use crate::reporter::{month_statement_paths, StatementReporter, REPORT_FILE};
use crate::rules::RuleTables;
use crate::settings::{load_settings, shellexpand_path, Settings};

/// First day of the calendar month before `today`.
fn previous_month(today: NaiveDate) -> NaiveDate {
    let last_of_previous = today.with_day(1).and_then(|d| d.pred_opt()).unwrap_or(today);
    last_of_previous.with_day(1).unwrap_or(last_of_previous)
}

/// `<finances_dir>/<YEAR>/<MonthName>`
fn month_dir(settings: &Settings, month: NaiveDate) -> PathBuf {
    PathBuf::from(shellexpand_path(&settings.finances_dir))
        .join(month.year().to_string())
        .join(month.format("%B").to_string())
}

pub fn run(month: Option<&str>, dir: Option<&str>, output: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let dir = match (dir, month) {
        (Some(dir), _) => PathBuf::from(shellexpand_path(dir)),
        (None, Some(month)) => month_dir(&settings, parse_month(month)?),
        (None, None) => month_dir(&settings, previous_month(Local::now().date_naive())),
    };

    let mut statements = Vec::new();
    for (kind, path) in month_statement_paths(&dir)? {
        info!("Reading {} as {}", path.display(), kind.name());
        statements.push(kind.read(&path, &settings)?);
    }
    if statements.is_empty() {
        return Err(TallyError::Validation(format!("no statements found in {}", dir.display())));
    }

    let rules = RuleTables::load(&settings.rules_dir())?;
    let categorizer = Categorizer::new(&rules);
    let reporter = StatementReporter::new(statements)?;

    let output = output
        .map(|o| PathBuf::from(shellexpand_path(o)))
        .unwrap_or_else(|| dir.join(REPORT_FILE));
    let written = reporter.store_csv(&categorizer, &output)?;
    println!(
        "Wrote {written} transactions from {} statements to {}",
        reporter.statements().len(),
        output.display()
    );
    Ok(())
}
