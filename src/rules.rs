use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, TallyError};

pub const MAPPINGS_FILE: &str = "mappings.csv";
pub const IGNORED_TRANSACTIONS_FILE: &str = "ignored_transactions.csv";

const MAPPING_COLUMNS: [&str; 5] = [
    "long_description_regex",
    "short_description",
    "bank_category",
    "sub_category",
    "category",
];
const IGNORE_COLUMNS: [&str; 2] = ["type", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MappingColumn {
    LongDescriptionRegex,
    ShortDescription,
    BankCategory,
    SubCategory,
    Category,
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    #[serde(default)]
    long_description_regex: String,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    bank_category: String,
    #[serde(default)]
    sub_category: String,
    #[serde(default)]
    category: String,
}

impl MappingRow {
    fn get(&self, column: MappingColumn) -> &str {
        match column {
            MappingColumn::LongDescriptionRegex => &self.long_description_regex,
            MappingColumn::ShortDescription => &self.short_description,
            MappingColumn::BankCategory => &self.bank_category,
            MappingColumn::SubCategory => &self.sub_category,
            MappingColumn::Category => &self.category,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IgnoreRow {
    #[serde(rename = "type")]
    kind: String,
    description: String,
}

/// Description filters. `full` entries must equal the description, `partial`
/// entries only need to occur in it.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    pub full: HashSet<String>,
    pub partial: BTreeSet<String>,
}

impl IgnoreRules {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        {
            let headers: Vec<&str> = rdr.headers()?.iter().collect();
            if headers != IGNORE_COLUMNS {
                return Err(TallyError::Validation(format!(
                    "expected ignore rules with columns {IGNORE_COLUMNS:?}, found {headers:?}"
                )));
            }
        }

        let mut rules = Self::default();
        for row in rdr.deserialize() {
            let row: IgnoreRow = row?;
            match row.kind.as_str() {
                "full" => {
                    rules.full.insert(row.description);
                }
                "partial" => {
                    rules.partial.insert(row.description);
                }
                other => {
                    return Err(TallyError::Validation(format!(
                        "unknown ignore rule type '{other}', expected 'full' or 'partial'"
                    )))
                }
            }
        }
        Ok(rules)
    }

    pub fn matches(&self, description: &str) -> bool {
        self.full.contains(description) || self.partial.iter().any(|p| description.contains(p.as_str()))
    }
}

/// Categorization lookup tables, loaded once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    /// Ordered as in the rule file; the first matching pattern wins.
    pub description_rewrites: Vec<(Regex, String)>,
    pub short_description_to_category: HashMap<String, String>,
    pub short_description_to_sub_category: HashMap<String, String>,
    pub sub_category_to_category: HashMap<String, String>,
    pub bank_category_to_category: HashMap<String, String>,
    pub bank_category_to_sub_category: HashMap<String, String>,
    pub ignore: IgnoreRules,
}

impl RuleTables {
    /// Load `mappings.csv` and `ignored_transactions.csv` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let open = |name: &str| {
            let path = dir.join(name);
            std::fs::File::open(&path).map_err(|e| {
                TallyError::Validation(format!("cannot open rule file {}: {e}", path.display()))
            })
        };
        Self::from_readers(open(MAPPINGS_FILE)?, open(IGNORED_TRANSACTIONS_FILE)?)
    }

    pub fn from_readers<M: Read, I: Read>(mappings: M, ignored: I) -> Result<Self> {
        let rows = read_mapping_rows(mappings)?;
        use MappingColumn::*;
        Ok(Self {
            description_rewrites: load_rewrites(&rows)?,
            short_description_to_category: load_map(&rows, ShortDescription, Category),
            short_description_to_sub_category: load_map(&rows, ShortDescription, SubCategory),
            sub_category_to_category: load_map(&rows, SubCategory, Category),
            bank_category_to_category: load_map(&rows, BankCategory, Category),
            bank_category_to_sub_category: load_map(&rows, BankCategory, SubCategory),
            ignore: IgnoreRules::from_reader(ignored)?,
        })
    }
}

fn read_mapping_rows<R: Read>(reader: R) -> Result<Vec<MappingRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    {
        let found: BTreeSet<&str> = rdr.headers()?.iter().collect();
        let expected: BTreeSet<&str> = MAPPING_COLUMNS.into_iter().collect();
        if found != expected {
            return Err(TallyError::Validation(format!(
                "expected mapping rules with columns {expected:?}, found {found:?}"
            )));
        }
    }
    Ok(rdr.deserialize().collect::<std::result::Result<Vec<MappingRow>, _>>()?)
}

/// A row contributes only when both columns are filled in. A later row for
/// the same key replaces the value.
fn load_map(rows: &[MappingRow], from: MappingColumn, to: MappingColumn) -> HashMap<String, String> {
    rows.iter()
        .filter(|r| !r.get(from).is_empty() && !r.get(to).is_empty())
        .map(|r| (r.get(from).to_string(), r.get(to).to_string()))
        .collect()
}

fn load_rewrites(rows: &[MappingRow]) -> Result<Vec<(Regex, String)>> {
    let mut rewrites: Vec<(Regex, String)> = Vec::new();
    for row in rows {
        let pattern = row.get(MappingColumn::LongDescriptionRegex);
        let short = row.get(MappingColumn::ShortDescription);
        if pattern.is_empty() || short.is_empty() {
            continue;
        }
        // Same pattern twice: keep the first position, take the later value.
        if let Some(existing) = rewrites.iter_mut().find(|(re, _)| re.as_str() == pattern) {
            existing.1 = short.to_string();
            continue;
        }
        let re = Regex::new(pattern)
            .map_err(|e| TallyError::Validation(format!("invalid description regex '{pattern}': {e}")))?;
        rewrites.push((re, short.to_string()));
    }
    Ok(rewrites)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPINGS: &str = "\
long_description_regex,short_description,bank_category,sub_category,category
^CARD PAYMENT TO TESCO,Tesco,,Groceries,
TESCO,Tesco Express,,,
,Groceries,,,Household essentials
,,Eating out,Restaurants,Fun
,Netflix,,Subscriptions,Entertainment
";

    const IGNORED: &str = "\
type,description
full,INITIAL BALANCE
partial,TRANSFER TO SAVINGS
";

    fn tables() -> RuleTables {
        RuleTables::from_readers(MAPPINGS.as_bytes(), IGNORED.as_bytes()).unwrap()
    }

    #[test]
    fn test_maps_only_include_complete_pairs() {
        let t = tables();
        assert_eq!(t.short_description_to_sub_category.get("Tesco").map(String::as_str), Some("Groceries"));
        assert!(!t.short_description_to_category.contains_key("Tesco"));
        assert_eq!(t.short_description_to_category.get("Groceries").map(String::as_str), Some("Household essentials"));
        assert_eq!(t.bank_category_to_category.get("Eating out").map(String::as_str), Some("Fun"));
        assert_eq!(t.bank_category_to_sub_category.get("Eating out").map(String::as_str), Some("Restaurants"));
        assert_eq!(t.sub_category_to_category.get("Subscriptions").map(String::as_str), Some("Entertainment"));
        assert_eq!(t.sub_category_to_category.get("Restaurants").map(String::as_str), Some("Fun"));
    }

    #[test]
    fn test_rewrites_keep_file_order() {
        let t = tables();
        let patterns: Vec<&str> = t.description_rewrites.iter().map(|(re, _)| re.as_str()).collect();
        assert_eq!(patterns, vec!["^CARD PAYMENT TO TESCO", "TESCO"]);
    }

    #[test]
    fn test_repeated_pattern_keeps_position_takes_last_value() {
        let mappings = format!("{MAPPINGS}^CARD PAYMENT TO TESCO,Tesco Superstore,,,\n");
        let t = RuleTables::from_readers(mappings.as_bytes(), IGNORED.as_bytes()).unwrap();
        assert_eq!(t.description_rewrites.len(), 2);
        assert_eq!(t.description_rewrites[0].1, "Tesco Superstore");
    }

    #[test]
    fn test_mapping_header_order_does_not_matter() {
        let mappings = "category,sub_category,bank_category,short_description,long_description_regex\nFun,,,Cinema,\n";
        let t = RuleTables::from_readers(mappings.as_bytes(), IGNORED.as_bytes()).unwrap();
        assert_eq!(t.short_description_to_category.get("Cinema").map(String::as_str), Some("Fun"));
    }

    #[test]
    fn test_mapping_header_mismatch_is_fatal() {
        let mappings = "long_description_regex,short_description,category\n";
        let err = RuleTables::from_readers(mappings.as_bytes(), IGNORED.as_bytes()).unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)), "{err}");
    }

    #[test]
    fn test_invalid_regex_is_fatal() {
        let mappings = "long_description_regex,short_description,bank_category,sub_category,category\n(unclosed,Oops,,,\n";
        assert!(matches!(
            RuleTables::from_readers(mappings.as_bytes(), IGNORED.as_bytes()),
            Err(TallyError::Validation(_))
        ));
    }

    #[test]
    fn test_ignore_rules() {
        let t = tables();
        assert!(t.ignore.matches("INITIAL BALANCE"));
        assert!(!t.ignore.matches("INITIAL BALANCE CORRECTION"));
        assert!(t.ignore.matches("TRANSFER TO SAVINGS 0042"));
        assert!(!t.ignore.matches("TESCO"));
    }

    #[test]
    fn test_ignore_header_must_match_exactly() {
        let ignored = "description,type\nINITIAL BALANCE,full\n";
        assert!(matches!(IgnoreRules::from_reader(ignored.as_bytes()), Err(TallyError::Validation(_))));
    }

    #[test]
    fn test_unknown_ignore_type() {
        let ignored = "type,description\nfuzzy,TESCO\n";
        assert!(matches!(IgnoreRules::from_reader(ignored.as_bytes()), Err(TallyError::Validation(_))));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MAPPINGS_FILE), MAPPINGS).unwrap();
        std::fs::write(dir.path().join(IGNORED_TRANSACTIONS_FILE), IGNORED).unwrap();
        let t = RuleTables::load(dir.path()).unwrap();
        assert_eq!(t.description_rewrites.len(), 2);
        assert_eq!(t.ignore.full.len(), 1);
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(RuleTables::load(&dir.path().join("nope")), Err(TallyError::Validation(_))));
    }
}
