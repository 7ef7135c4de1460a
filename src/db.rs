use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{Result, TallyError};
use crate::models::{Account, PrimaryKey, TextFeature, TextFeatureName, Transaction};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    account_type TEXT NOT NULL,
    metadata TEXT,
    added_on TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount TEXT NOT NULL,
    account_id TEXT NOT NULL,
    is_shared_expense INTEGER NOT NULL DEFAULT 0,
    bank_category TEXT,
    added_on TEXT DEFAULT (datetime('now')),
    updated_on TEXT,
    PRIMARY KEY (date, description, amount),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS text_features (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    transaction_date TEXT NOT NULL,
    transaction_description TEXT NOT NULL,
    transaction_amount TEXT NOT NULL,
    value TEXT NOT NULL,
    origin TEXT NOT NULL,
    added_on TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (transaction_date, transaction_description, transaction_amount)
        REFERENCES transactions(date, description, amount)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    account_id TEXT NOT NULL,
    record_count INTEGER,
    from_date TEXT,
    to_date TEXT,
    checksum TEXT,
    import_date TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);
";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Column conversions
// ---------------------------------------------------------------------------

/// Scale-free text so `50`, `50.0` and `50.00` share one primary key.
fn amount_key(amount: Decimal) -> String {
    amount.normalize().to_string()
}

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn read_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| TallyError::Parse(format!("stored date '{raw}': {e}")))
}

fn read_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| TallyError::Parse(format!("stored amount '{raw}': {e}")))
}

fn read_timestamp(raw: Option<String>) -> Result<Option<NaiveDateTime>> {
    raw.map(|s| {
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
            .map_err(|e| TallyError::Parse(format!("stored timestamp '{s}': {e}")))
    })
    .transpose()
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

pub fn transaction_exists(conn: &Connection, key: &PrimaryKey) -> Result<bool> {
    let mut stmt =
        conn.prepare_cached("SELECT 1 FROM transactions WHERE date = ?1 AND description = ?2 AND amount = ?3")?;
    Ok(stmt.exists(params![date_key(key.0), key.1, amount_key(key.2)])?)
}

/// Insert unless a row with the same primary key is already stored. With
/// `ignore_duplicates` off, an existing row is an error.
pub fn insert_transaction(conn: &Connection, t: &Transaction, ignore_duplicates: bool) -> Result<InsertOutcome> {
    if let Some(stored) = get_transaction(conn, &t.primary_key())? {
        if !ignore_duplicates {
            return Err(TallyError::DuplicateTransaction(t.to_string()));
        }
        if stored.similar(t) {
            debug!("Transaction {t} already stored, skipping");
        } else {
            debug!("Transaction {t} already stored as {stored}, keeping the stored copy");
        }
        return Ok(InsertOutcome::AlreadyExists);
    }
    conn.execute(
        "INSERT INTO transactions (date, description, amount, account_id, is_shared_expense, bank_category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            date_key(t.date),
            t.description,
            amount_key(t.amount),
            t.account_id,
            t.is_shared_expense,
            t.bank_category,
        ],
    )?;
    Ok(InsertOutcome::Inserted)
}

/// Change the account and/or shared flag of the stored row with `t`'s
/// primary key. Returns false when no such row exists.
pub fn update_transaction(
    conn: &Connection,
    t: &Transaction,
    account_id: Option<&str>,
    is_shared_expense: Option<bool>,
) -> Result<bool> {
    if account_id.is_none() && is_shared_expense.is_none() {
        return transaction_exists(conn, &t.primary_key());
    }
    let changed = conn.execute(
        "UPDATE transactions
         SET account_id = COALESCE(?4, account_id),
             is_shared_expense = COALESCE(?5, is_shared_expense),
             updated_on = datetime('now')
         WHERE date = ?1 AND description = ?2 AND amount = ?3",
        params![date_key(t.date), t.description, amount_key(t.amount), account_id, is_shared_expense],
    )?;
    Ok(changed > 0)
}

struct TransactionRow {
    date: String,
    description: String,
    amount: String,
    account_id: String,
    is_shared_expense: bool,
    bank_category: Option<String>,
    added_on: Option<String>,
    updated_on: Option<String>,
}

impl TransactionRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            description: row.get(1)?,
            amount: row.get(2)?,
            account_id: row.get(3)?,
            is_shared_expense: row.get(4)?,
            bank_category: row.get(5)?,
            added_on: row.get(6)?,
            updated_on: row.get(7)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            date: read_date(&self.date)?,
            description: self.description,
            amount: read_amount(&self.amount)?,
            account_id: self.account_id,
            is_shared_expense: self.is_shared_expense,
            bank_category: self.bank_category,
            added_on: read_timestamp(self.added_on)?,
            updated_on: read_timestamp(self.updated_on)?,
        })
    }
}

const TRANSACTION_COLUMNS: &str =
    "date, description, amount, account_id, is_shared_expense, bank_category, added_on, updated_on";

pub fn get_transaction(conn: &Connection, key: &PrimaryKey) -> Result<Option<Transaction>> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE date = ?1 AND description = ?2 AND amount = ?3"
    );
    let row = conn
        .query_row(&sql, params![date_key(key.0), key.1, amount_key(key.2)], TransactionRow::from_row)
        .optional()?;
    row.map(TransactionRow::into_transaction).transpose()
}

/// All stored transactions, optionally for one account, by date then description.
pub fn get_transactions(conn: &Connection, account_id: Option<&str>) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions
         WHERE ?1 IS NULL OR account_id = ?1
         ORDER BY date, description"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([account_id], TransactionRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(TransactionRow::into_transaction).collect()
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub fn insert_account(conn: &Connection, id: &str, account_type: &str, metadata: Option<&str>) -> Result<()> {
    if account_exists(conn, id)? {
        return Err(TallyError::Validation(format!("account '{id}' already exists")));
    }
    conn.execute(
        "INSERT INTO accounts (id, account_type, metadata) VALUES (?1, ?2, ?3)",
        params![id, account_type, metadata],
    )?;
    Ok(())
}

pub fn account_exists(conn: &Connection, id: &str) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM accounts WHERE id = ?1")?;
    Ok(stmt.exists([id])?)
}

pub fn get_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, account_type, metadata, added_on FROM accounts ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, account_type, metadata, added_on)| {
            Ok(Account {
                id,
                account_type,
                metadata,
                added_on: read_timestamp(added_on)?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Text features
// ---------------------------------------------------------------------------

/// Features are not unique; recording the same one twice keeps both rows.
pub fn insert_text_feature(conn: &Connection, feature: &TextFeature) -> Result<()> {
    let (date, description, amount) = &feature.transaction_id;
    conn.execute(
        "INSERT INTO text_features (name, transaction_date, transaction_description, transaction_amount, value, origin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            feature.name.key(),
            date_key(*date),
            description,
            amount_key(*amount),
            feature.value,
            feature.origin,
        ],
    )?;
    Ok(())
}

/// Features in insertion order, optionally only those of one transaction.
pub fn get_text_features(conn: &Connection, transaction: Option<&PrimaryKey>) -> Result<Vec<TextFeature>> {
    let (date, description, amount) = match transaction {
        Some((d, desc, a)) => (Some(date_key(*d)), Some(desc.as_str()), Some(amount_key(*a))),
        None => (None, None, None),
    };
    let mut stmt = conn.prepare(
        "SELECT name, transaction_date, transaction_description, transaction_amount, value, origin, added_on
         FROM text_features
         WHERE ?1 IS NULL OR (transaction_date = ?1 AND transaction_description = ?2 AND transaction_amount = ?3)
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![date, description, amount], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(name, date, description, amount, value, origin, added_on)| {
            let name = TextFeatureName::from_key(&name)
                .ok_or_else(|| TallyError::Parse(format!("unknown text feature '{name}'")))?;
            Ok(TextFeature {
                name,
                transaction_id: (read_date(&date)?, description, read_amount(&amount)?),
                value,
                origin,
                added_on: read_timestamp(added_on)?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Import bookkeeping
// ---------------------------------------------------------------------------

pub struct ImportRecord<'a> {
    pub filename: &'a str,
    pub account_id: &'a str,
    pub record_count: usize,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub checksum: &'a str,
}

pub fn import_exists(conn: &Connection, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM imports WHERE checksum = ?1")?;
    Ok(stmt.exists([checksum])?)
}

pub fn record_import(conn: &Connection, record: &ImportRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (filename, account_id, record_count, from_date, to_date, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.filename,
            record.account_id,
            record.record_count as i64,
            date_key(record.from_date),
            date_key(record.to_date),
            record.checksum,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MANUAL_ORIGIN;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        insert_account(&conn, "revolut", "payment_app", None).unwrap();
        insert_account(&conn, "santander_basic", "bank_statement", None).unwrap();
        (dir, conn)
    }

    fn txn(description: &str, amount: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2023, 11, 24).unwrap(),
            description,
            Decimal::from_str(amount).unwrap(),
            "revolut",
        )
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["accounts", "transactions", "text_features", "imports"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        insert_transaction(&conn, &txn("Stuff", "50.0"), true).unwrap();
        init_db(&conn).unwrap();
        assert_eq!(get_transactions(&conn, None).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_and_read_back() {
        let (_dir, conn) = test_db();
        let mut t = txn("Stuff", "50.0");
        t.bank_category = Some("Shopping".to_string());
        assert_eq!(insert_transaction(&conn, &t, true).unwrap(), InsertOutcome::Inserted);

        let stored = get_transactions(&conn, None).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(t.similar(&stored[0]));
        assert!(stored[0].added_on.is_some());
        assert!(stored[0].updated_on.is_none());
    }

    #[test]
    fn test_duplicate_is_swallowed_when_ignoring() {
        let (_dir, conn) = test_db();
        insert_transaction(&conn, &txn("Stuff", "50.0"), true).unwrap();
        // Same key with a different scale and account.
        let mut again = txn("Stuff", "50.00");
        again.account_id = "santander_basic".to_string();
        assert_eq!(insert_transaction(&conn, &again, true).unwrap(), InsertOutcome::AlreadyExists);

        let stored = get_transactions(&conn, None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].account_id, "revolut");
    }

    #[test]
    fn test_duplicate_is_an_error_when_strict() {
        let (_dir, conn) = test_db();
        insert_transaction(&conn, &txn("Stuff", "50"), false).unwrap();
        assert!(matches!(
            insert_transaction(&conn, &txn("Stuff", "50"), false),
            Err(TallyError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn test_sign_is_part_of_the_key() {
        let (_dir, conn) = test_db();
        insert_transaction(&conn, &txn("Refund", "50"), false).unwrap();
        insert_transaction(&conn, &txn("Refund", "-50"), false).unwrap();
        assert_eq!(get_transactions(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn test_update_transaction() {
        let (_dir, conn) = test_db();
        let t = txn("Dinner", "64.20");
        insert_transaction(&conn, &t, true).unwrap();

        assert!(update_transaction(&conn, &t, Some("santander_basic"), Some(true)).unwrap());
        let stored = get_transaction(&conn, &t.primary_key()).unwrap().unwrap();
        assert_eq!(stored.account_id, "santander_basic");
        assert!(stored.is_shared_expense);
        assert!(stored.updated_on.is_some());
        assert_eq!(stored.description, "Dinner");

        assert!(update_transaction(&conn, &t, None, Some(false)).unwrap());
        let stored = get_transaction(&conn, &t.primary_key()).unwrap().unwrap();
        assert_eq!(stored.account_id, "santander_basic");
        assert!(!stored.is_shared_expense);
    }

    #[test]
    fn test_update_missing_transaction() {
        let (_dir, conn) = test_db();
        assert!(!update_transaction(&conn, &txn("Nothing", "1"), None, Some(true)).unwrap());
    }

    #[test]
    fn test_get_transactions_by_account() {
        let (_dir, conn) = test_db();
        insert_transaction(&conn, &txn("A", "1"), true).unwrap();
        let mut b = txn("B", "2");
        b.account_id = "santander_basic".to_string();
        insert_transaction(&conn, &b, true).unwrap();

        let basic = get_transactions(&conn, Some("santander_basic")).unwrap();
        assert_eq!(basic.len(), 1);
        assert_eq!(basic[0].description, "B");
        assert_eq!(get_transactions(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn test_transaction_needs_known_account() {
        let (_dir, conn) = test_db();
        let mut t = txn("Orphan", "1");
        t.account_id = "nowhere".to_string();
        assert!(matches!(insert_transaction(&conn, &t, true), Err(TallyError::Db(_))));
    }

    #[test]
    fn test_accounts() {
        let (_dir, conn) = test_db();
        insert_account(&conn, "amex", "credit_card", Some(r#"{"holder":"joint"}"#)).unwrap();
        assert!(account_exists(&conn, "amex").unwrap());
        assert!(!account_exists(&conn, "monzo").unwrap());
        assert!(insert_account(&conn, "amex", "credit_card", None).is_err());

        let accounts = get_accounts(&conn).unwrap();
        let ids: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["amex", "revolut", "santander_basic"]);
        assert_eq!(accounts[0].metadata.as_deref(), Some(r#"{"holder":"joint"}"#));
        assert!(accounts[0].added_on.is_some());
    }

    #[test]
    fn test_text_features_tolerate_duplicates() {
        let (_dir, conn) = test_db();
        let t = txn("AMZN MKTP UK*2K4", "12.99");
        insert_transaction(&conn, &t, true).unwrap();
        let feature = TextFeature {
            name: TextFeatureName::ShortDescription,
            transaction_id: t.primary_key(),
            value: "Amazon".to_string(),
            origin: MANUAL_ORIGIN.to_string(),
            added_on: None,
        };
        insert_text_feature(&conn, &feature).unwrap();
        insert_text_feature(&conn, &feature).unwrap();

        let stored = get_text_features(&conn, Some(&t.primary_key())).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|f| f.similar(&feature)));
        assert!(get_text_features(&conn, Some(&txn("Other", "1").primary_key())).unwrap().is_empty());
        assert_eq!(get_text_features(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn test_import_records() {
        let (_dir, conn) = test_db();
        assert!(!import_exists(&conn, "abc123").unwrap());
        let day = NaiveDate::from_ymd_opt(2023, 1, 5).unwrap();
        record_import(
            &conn,
            &ImportRecord {
                filename: "revolut.csv",
                account_id: "revolut",
                record_count: 3,
                from_date: day,
                to_date: day,
                checksum: "abc123",
            },
        )
        .unwrap();
        assert!(import_exists(&conn, "abc123").unwrap());
        let count: i64 = conn.query_row("SELECT record_count FROM imports", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 3);
    }
}
