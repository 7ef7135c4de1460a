use crate::models::{ProcessedTransaction, Transaction};
use crate::rules::RuleTables;

/// Resolves short descriptions and categories from a set of rule tables.
/// Pure: the same transaction and tables always give the same result.
pub struct Categorizer<'a> {
    rules: &'a RuleTables,
}

impl<'a> Categorizer<'a> {
    pub fn new(rules: &'a RuleTables) -> Self {
        Self { rules }
    }

    /// First matching pattern in rule-file order wins; no match keeps the
    /// description as is.
    pub fn rewrite_description(&self, description: &str) -> String {
        self.rules
            .description_rewrites
            .iter()
            .find(|(re, _)| re.is_match(description))
            .map(|(_, short)| short.clone())
            .unwrap_or_else(|| description.to_string())
    }

    /// Bank category first, then the (rewritten) description.
    pub fn sub_category(&self, description: &str, bank_category: Option<&str>) -> Option<String> {
        bank_category
            .and_then(|b| self.rules.bank_category_to_sub_category.get(b))
            .or_else(|| self.rules.short_description_to_sub_category.get(description))
            .cloned()
    }

    /// Bank category, then sub-category, then description.
    pub fn category(&self, description: &str, sub_category: Option<&str>, bank_category: Option<&str>) -> Option<String> {
        bank_category
            .and_then(|b| self.rules.bank_category_to_category.get(b))
            .or_else(|| sub_category.and_then(|s| self.rules.sub_category_to_category.get(s)))
            .or_else(|| self.rules.short_description_to_category.get(description))
            .cloned()
    }

    pub fn categorize(&self, transaction: &Transaction) -> ProcessedTransaction {
        let description = self.rewrite_description(&transaction.description);
        let bank_category = transaction.bank_category.as_deref();
        let sub_category = self.sub_category(&description, bank_category);
        let category = self.category(&description, sub_category.as_deref(), bank_category);

        ProcessedTransaction {
            transaction: Transaction {
                description,
                ..transaction.clone()
            },
            category,
            sub_category,
        }
    }

    /// Checked against the raw description, before any rewrite.
    pub fn should_ignore(&self, transaction: &Transaction) -> bool {
        self.rules.ignore.matches(&transaction.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    const MAPPINGS: &str = "\
long_description_regex,short_description,bank_category,sub_category,category
^CARD PAYMENT TO TESCO,Tesco,,,
TESCO,Tesco Express,,,
,Tesco,,Groceries,
,,,Groceries,Household essentials
,,Eating out,Restaurants,Going out
,Wagamama,,Restaurants,
,Pret,,,Lunch
,Cinema,,Films,
,,Transport,,Travel
";

    const IGNORED: &str = "type,description\nfull,INITIAL BALANCE\npartial,TO SAVINGS\n";

    fn tables() -> RuleTables {
        RuleTables::from_readers(MAPPINGS.as_bytes(), IGNORED.as_bytes()).unwrap()
    }

    fn txn(description: &str, bank_category: Option<&str>) -> Transaction {
        let mut t = Transaction::new(
            NaiveDate::from_ymd_opt(2023, 9, 4).unwrap(),
            description,
            Decimal::new(1250, 2),
            "santander_basic",
        );
        t.bank_category = bank_category.map(str::to_string);
        t
    }

    #[test]
    fn test_first_matching_regex_wins() {
        let rules = tables();
        let c = Categorizer::new(&rules);
        assert_eq!(c.rewrite_description("CARD PAYMENT TO TESCO STORES 3297"), "Tesco");
        assert_eq!(c.rewrite_description("TESCO EXPRESS"), "Tesco Express");
        assert_eq!(c.rewrite_description("SAINSBURYS"), "SAINSBURYS");
    }

    #[test]
    fn test_category_via_sub_category() {
        let rules = tables();
        let p = Categorizer::new(&rules).categorize(&txn("CARD PAYMENT TO TESCO STORES", None));
        assert_eq!(p.transaction.description, "Tesco");
        assert_eq!(p.sub_category.as_deref(), Some("Groceries"));
        assert_eq!(p.category.as_deref(), Some("Household essentials"));
        assert_eq!(p.is_household_expense(), Some(true));
        assert_eq!(p.transaction.amount, Decimal::new(1250, 2));
        assert_eq!(p.transaction.account_id, "santander_basic");
    }

    #[test]
    fn test_bank_category_beats_sub_category() {
        let rules = tables();
        // "Tesco" would resolve to Household essentials through its sub-category.
        let p = Categorizer::new(&rules).categorize(&txn("CARD PAYMENT TO TESCO", Some("Transport")));
        assert_eq!(p.category.as_deref(), Some("Travel"));
        assert_eq!(p.sub_category.as_deref(), Some("Groceries"));
        assert_eq!(p.is_household_expense(), Some(false));
    }

    #[test]
    fn test_bank_category_sub_category_wins() {
        let rules = tables();
        let p = Categorizer::new(&rules).categorize(&txn("Wagamama", Some("Eating out")));
        assert_eq!(p.sub_category.as_deref(), Some("Restaurants"));
        assert_eq!(p.category.as_deref(), Some("Going out"));
    }

    #[test]
    fn test_description_is_last_resort() {
        let rules = tables();
        let p = Categorizer::new(&rules).categorize(&txn("Pret", None));
        assert_eq!(p.sub_category, None);
        assert_eq!(p.category.as_deref(), Some("Lunch"));
    }

    #[test]
    fn test_sub_category_without_category() {
        let rules = tables();
        let p = Categorizer::new(&rules).categorize(&txn("Cinema", Some("Unknown bank category")));
        assert_eq!(p.sub_category.as_deref(), Some("Films"));
        assert_eq!(p.category, None);
        assert_eq!(p.is_household_expense(), None);
    }

    #[test]
    fn test_unknown_transaction_stays_uncategorized() {
        let rules = tables();
        let p = Categorizer::new(&rules).categorize(&txn("SOMETHING NEW", None));
        assert_eq!(p.transaction.description, "SOMETHING NEW");
        assert_eq!(p.category, None);
        assert_eq!(p.sub_category, None);
    }

    #[test]
    fn test_should_ignore() {
        let rules = tables();
        let c = Categorizer::new(&rules);
        assert!(c.should_ignore(&txn("INITIAL BALANCE", None)));
        assert!(c.should_ignore(&txn("TRANSFER TO SAVINGS", None)));
        assert!(!c.should_ignore(&txn("NOT THE INITIAL BALANCE", None)));
    }

    #[test]
    fn test_empty_rule_tables() {
        let rules = RuleTables::default();
        let p = Categorizer::new(&rules).categorize(&txn("Anything", Some("Groceries")));
        assert_eq!(p.transaction.description, "Anything");
        assert_eq!(p.category, None);
    }
}
