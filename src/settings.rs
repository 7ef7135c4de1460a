use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

pub const RULES_DIR_ENV: &str = "RULES_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Root of the `<YEAR>/<MonthName>/` statement tree.
    #[serde(default = "default_finances_dir")]
    pub finances_dir: String,
    /// Directory holding `mappings.csv` and `ignored_transactions.csv`.
    #[serde(default)]
    pub rules_dir: Option<String>,
    /// Last four digits of the card expected in credit-card exports.
    #[serde(default = "default_card_last_digits")]
    pub card_last_digits: String,
    /// Account-number substring (found in the file name) -> account id.
    #[serde(default = "default_account_map")]
    pub account_map: BTreeMap<String, String>,
    #[serde(default = "default_delimiters")]
    pub delimiters: Vec<String>,
    #[serde(default = "default_ignore_duplicates")]
    pub ignore_duplicates: bool,
}

fn default_finances_dir() -> String {
    home().join("Documents").join("finances").to_string_lossy().to_string()
}

fn default_card_last_digits() -> String {
    "9976".to_string()
}

fn default_account_map() -> BTreeMap<String, String> {
    [
        ("42564627", "santander_basic"),
        ("83154494", "santander_everyday"),
        ("17254953", "santander_123_current_account"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_delimiters() -> Vec<String> {
    vec![";".to_string(), ",".to_string()]
}

fn default_ignore_duplicates() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            finances_dir: default_finances_dir(),
            rules_dir: None,
            card_last_digits: default_card_last_digits(),
            account_map: default_account_map(),
            delimiters: default_delimiters(),
            ignore_duplicates: default_ignore_duplicates(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("tally.db")
    }

    /// `RULES_DIR` wins over the settings file, which wins over `<data_dir>/rules`.
    pub fn rules_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(RULES_DIR_ENV) {
            if !dir.is_empty() {
                return PathBuf::from(dir);
            }
        }
        match &self.rules_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.data_dir).join("rules"),
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn config_dir() -> PathBuf {
    home().join(".config").join("tally")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    home().join("Documents").join("tally")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TallyError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
