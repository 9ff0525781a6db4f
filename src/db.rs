use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::debug;

use crate::categorizer::{CustomRule, MatchType};
use crate::error::{Result, SpendError};
use crate::models::{
    BudgetPeriod, BudgetRecord, Category, ExpenseRecord, LineItem, Receipt, ReceiptStatus,
    ReceiptUpdate,
};
use crate::store::{ExpenseFilter, Store};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS receipts (
    user_id TEXT NOT NULL,
    receipt_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    stored_path TEXT NOT NULL,
    checksum TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    expense_id TEXT,
    error_message TEXT,
    uploaded_at TEXT NOT NULL,
    processed_at TEXT,
    PRIMARY KEY (user_id, receipt_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_receipts_checksum ON receipts(user_id, checksum);

CREATE TABLE IF NOT EXISTS expenses (
    user_id TEXT NOT NULL,
    expense_id TEXT NOT NULL,
    receipt_id TEXT,
    amount TEXT NOT NULL,
    merchant TEXT NOT NULL,
    category TEXT NOT NULL,
    category_confidence INTEGER NOT NULL DEFAULT 0,
    date TEXT NOT NULL,
    line_items TEXT NOT NULL DEFAULT '[]',
    tax TEXT,
    confidence INTEGER NOT NULL,
    notes TEXT,
    is_flagged INTEGER DEFAULT 0,
    flag_reason TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, expense_id)
);

CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date);
CREATE INDEX IF NOT EXISTS idx_expenses_user_category ON expenses(user_id, category);

CREATE TABLE IF NOT EXISTS budgets (
    user_id TEXT NOT NULL,
    budget_id TEXT NOT NULL,
    category TEXT NOT NULL,
    amount TEXT NOT NULL,
    period TEXT NOT NULL,
    alert_threshold INTEGER NOT NULL DEFAULT 90,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, budget_id)
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    pattern TEXT NOT NULL,
    match_type TEXT DEFAULT 'contains',
    category TEXT NOT NULL,
    priority INTEGER DEFAULT 0,
    hit_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);
";

const EXPENSE_COLUMNS: &str = "expense_id, user_id, receipt_id, amount, merchant, category, \
     category_confidence, date, line_items, tax, confidence, notes, is_flagged, flag_reason";

const BUDGET_COLUMNS: &str = "budget_id, user_id, category, amount, period, alert_threshold, is_active";

const RECEIPT_COLUMNS: &str = "user_id, receipt_id, filename, stored_path, checksum, status, \
     expense_id, error_message, uploaded_at, processed_at";

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
// Column helpers
// ---------------------------------------------------------------------------

fn parsed_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn line_items_col(row: &Row, idx: usize) -> rusqlite::Result<Vec<LineItem>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn expense_from_row(row: &Row) -> rusqlite::Result<ExpenseRecord> {
    Ok(ExpenseRecord {
        expense_id: row.get(0)?,
        user_id: row.get(1)?,
        receipt_id: row.get(2)?,
        amount: parsed_col(row, 3)?,
        merchant: row.get(4)?,
        category: parsed_col(row, 5)?,
        category_confidence: row.get(6)?,
        date: row.get(7)?,
        line_items: line_items_col(row, 8)?,
        tax: opt_decimal_col(row, 9)?,
        confidence: row.get(10)?,
        notes: row.get(11)?,
        is_flagged: row.get::<_, i64>(12)? != 0,
        flag_reason: row.get(13)?,
    })
}

fn budget_from_row(row: &Row) -> rusqlite::Result<BudgetRecord> {
    Ok(BudgetRecord {
        budget_id: row.get(0)?,
        user_id: row.get(1)?,
        category: parsed_col(row, 2)?,
        amount: parsed_col(row, 3)?,
        period: parsed_col(row, 4)?,
        alert_threshold: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
    })
}

fn receipt_from_row(row: &Row) -> rusqlite::Result<Receipt> {
    Ok(Receipt {
        user_id: row.get(0)?,
        receipt_id: row.get(1)?,
        filename: row.get(2)?,
        stored_path: row.get(3)?,
        checksum: row.get(4)?,
        status: parsed_col(row, 5)?,
        expense_id: row.get(6)?,
        error_message: row.get(7)?,
        uploaded_at: row.get(8)?,
        processed_at: row.get(9)?,
    })
}

/// A stored user rule plus its hit counter.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRule {
    pub rule: CustomRule,
    pub hit_count: i64,
}

fn rule_from_row(row: &Row) -> rusqlite::Result<StoredRule> {
    let match_type: String = row.get(2)?;
    let match_type = MatchType::parse(&match_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown match type '{match_type}'").into(),
        )
    })?;
    Ok(StoredRule {
        rule: CustomRule {
            id: row.get(0)?,
            pattern: row.get(1)?,
            match_type,
            category: parsed_col(row, 3)?,
            priority: row.get(4)?,
        },
        hit_count: row.get(5)?,
    })
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) and make sure the schema exists.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Expand an ID prefix to the one full ID it names.
    fn resolve_prefix(&self, table: &str, column: &str, user_id: &str, prefix: &str) -> Result<String> {
        let label = table.trim_end_matches('s');
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(SpendError::Validation(format!("{label} id is required")));
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column} FROM {table} WHERE user_id = ?1 AND substr({column}, 1, length(?2)) = ?2 LIMIT 2"
        ))?;
        let ids = stmt
            .query_map(params![user_id, prefix], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        match ids.as_slice() {
            [id] => Ok(id.clone()),
            [] => Err(SpendError::NotFound(format!("{label} {prefix}"))),
            _ => Err(SpendError::Validation(format!(
                "{label} id '{prefix}' is ambiguous, use more characters"
            ))),
        }
    }

    pub fn resolve_expense_id(&self, user_id: &str, prefix: &str) -> Result<String> {
        self.resolve_prefix("expenses", "expense_id", user_id, prefix)
    }

    pub fn resolve_receipt_id(&self, user_id: &str, prefix: &str) -> Result<String> {
        self.resolve_prefix("receipts", "receipt_id", user_id, prefix)
    }

    pub fn resolve_budget_id(&self, user_id: &str, prefix: &str) -> Result<String> {
        self.resolve_prefix("budgets", "budget_id", user_id, prefix)
    }

    // -- expenses ----------------------------------------------------------

    pub fn get_expense(&self, user_id: &str, expense_id: &str) -> Result<ExpenseRecord> {
        self.conn
            .query_row(
                &format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_id = ?1 AND expense_id = ?2"),
                params![user_id, expense_id],
                expense_from_row,
            )
            .optional()?
            .ok_or_else(|| SpendError::NotFound(format!("expense {expense_id}")))
    }

    pub fn delete_expense(&self, user_id: &str, expense_id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM expenses WHERE user_id = ?1 AND expense_id = ?2",
            params![user_id, expense_id],
        )?;
        if deleted == 0 {
            return Err(SpendError::NotFound(format!("expense {expense_id}")));
        }
        Ok(())
    }

    pub fn count_expenses(&self, user_id: &str, flagged_only: bool) -> Result<i64> {
        let sql = if flagged_only {
            "SELECT count(*) FROM expenses WHERE user_id = ?1 AND is_flagged = 1"
        } else {
            "SELECT count(*) FROM expenses WHERE user_id = ?1"
        };
        Ok(self.conn.query_row(sql, [user_id], |r| r.get(0))?)
    }

    // -- budgets -----------------------------------------------------------

    pub fn insert_budget(&self, budget: &BudgetRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO budgets (budget_id, user_id, category, amount, period, alert_threshold, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                budget.budget_id,
                budget.user_id,
                budget.category.as_str(),
                budget.amount.to_string(),
                budget.period.as_str(),
                budget.alert_threshold,
                budget.is_active as i32,
            ],
        )?;
        Ok(())
    }

    pub fn save_budget(&self, budget: &BudgetRecord) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE budgets SET category = ?3, amount = ?4, period = ?5, alert_threshold = ?6, \
             is_active = ?7, updated_at = datetime('now') WHERE user_id = ?1 AND budget_id = ?2",
            params![
                budget.user_id,
                budget.budget_id,
                budget.category.as_str(),
                budget.amount.to_string(),
                budget.period.as_str(),
                budget.alert_threshold,
                budget.is_active as i32,
            ],
        )?;
        if updated == 0 {
            return Err(SpendError::NotFound(format!("budget {}", budget.budget_id)));
        }
        Ok(())
    }

    pub fn get_budget(&self, user_id: &str, budget_id: &str) -> Result<BudgetRecord> {
        self.conn
            .query_row(
                &format!("SELECT {BUDGET_COLUMNS} FROM budgets WHERE user_id = ?1 AND budget_id = ?2"),
                params![user_id, budget_id],
                budget_from_row,
            )
            .optional()?
            .ok_or_else(|| SpendError::NotFound(format!("budget {budget_id}")))
    }

    pub fn list_budgets(&self, user_id: &str, active_only: bool) -> Result<Vec<BudgetRecord>> {
        let sql = format!(
            "SELECT {BUDGET_COLUMNS} FROM budgets WHERE user_id = ?1{} ORDER BY created_at, budget_id",
            if active_only { " AND is_active = 1" } else { "" }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], budget_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn find_active_budget(
        &self,
        user_id: &str,
        category: Category,
        period: BudgetPeriod,
    ) -> Result<Option<BudgetRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {BUDGET_COLUMNS} FROM budgets \
                     WHERE user_id = ?1 AND category = ?2 AND period = ?3 AND is_active = 1"
                ),
                params![user_id, category.as_str(), period.as_str()],
                budget_from_row,
            )
            .optional()?)
    }

    // -- receipts ----------------------------------------------------------

    pub fn insert_receipt(&self, receipt: &Receipt) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO receipts ({RECEIPT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                receipt.user_id,
                receipt.receipt_id,
                receipt.filename,
                receipt.stored_path,
                receipt.checksum,
                receipt.status.as_str(),
                receipt.expense_id,
                receipt.error_message,
                receipt.uploaded_at,
                receipt.processed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_receipt(&self, user_id: &str, receipt_id: &str) -> Result<Receipt> {
        self.conn
            .query_row(
                &format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE user_id = ?1 AND receipt_id = ?2"),
                params![user_id, receipt_id],
                receipt_from_row,
            )
            .optional()?
            .ok_or_else(|| SpendError::NotFound(format!("receipt {receipt_id}")))
    }

    pub fn find_receipt_by_checksum(&self, user_id: &str, checksum: &str) -> Result<Option<Receipt>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE user_id = ?1 AND checksum = ?2"),
                params![user_id, checksum],
                receipt_from_row,
            )
            .optional()?)
    }

    pub fn list_receipts(&self, user_id: &str, status: Option<ReceiptStatus>) -> Result<Vec<Receipt>> {
        let mut sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE user_id = ?1");
        let mut values: Vec<String> = vec![user_id.to_string()];
        if let Some(status) = status {
            sql.push_str(" AND status = ?2");
            values.push(status.as_str().to_string());
        }
        sql.push_str(" ORDER BY uploaded_at DESC, receipt_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), receipt_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // -- rules -------------------------------------------------------------

    pub fn add_rule(
        &self,
        user_id: &str,
        pattern: &str,
        match_type: MatchType,
        category: Category,
        priority: i64,
    ) -> Result<i64> {
        if match_type == MatchType::Regex {
            regex::Regex::new(pattern)
                .map_err(|e| SpendError::Validation(format!("Invalid regex '{pattern}': {e}")))?;
        }
        self.conn.execute(
            "INSERT INTO rules (user_id, pattern, match_type, category, priority) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, pattern, match_type.as_str(), category.as_str(), priority],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_rules(&self, user_id: &str) -> Result<Vec<StoredRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pattern, match_type, category, priority, hit_count FROM rules \
             WHERE user_id = ?1 AND is_active = 1 ORDER BY priority DESC, id",
        )?;
        let rows = stmt.query_map([user_id], rule_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn active_rules(&self, user_id: &str) -> Result<Vec<CustomRule>> {
        Ok(self.list_rules(user_id)?.into_iter().map(|r| r.rule).collect())
    }

    pub fn deactivate_rule(&self, user_id: &str, id: i64) -> Result<StoredRule> {
        let found = self
            .list_rules(user_id)?
            .into_iter()
            .find(|r| r.rule.id == id)
            .ok_or_else(|| SpendError::NotFound(format!("active rule {id}")))?;
        self.conn.execute(
            "UPDATE rules SET is_active = 0 WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(found)
    }
}

impl Store for SqliteStore {
    fn get_records(&self, user_id: &str, filter: &ExpenseFilter) -> Result<Vec<ExpenseRecord>> {
        let mut clauses = vec!["user_id = ?1".to_string()];
        let mut values: Vec<String> = vec![user_id.to_string()];
        if let Some(category) = filter.category {
            values.push(category.as_str().to_string());
            clauses.push(format!("category = ?{}", values.len()));
        }
        if let Some(from) = filter.from {
            values.push(from.format("%Y-%m-%d").to_string());
            clauses.push(format!("date >= ?{}", values.len()));
        }
        if let Some(to) = filter.to {
            values.push(to.format("%Y-%m-%d").to_string());
            clauses.push(format!("date <= ?{}", values.len()));
        }
        if filter.flagged_only {
            clauses.push("is_flagged = 1".to_string());
        }
        let order = if filter.newest_first {
            "date DESC, expense_id DESC"
        } else {
            "date ASC, expense_id ASC"
        };
        let mut sql = format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE {} ORDER BY {order}",
            clauses.join(" AND ")
        );
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), expense_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn put_record(&self, record: &ExpenseRecord) -> Result<()> {
        let line_items = serde_json::to_string(&record.line_items)?;
        self.conn.execute(
            &format!(
                "INSERT INTO expenses ({EXPENSE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
                 ON CONFLICT(user_id, expense_id) DO UPDATE SET \
                 receipt_id = excluded.receipt_id, amount = excluded.amount, \
                 merchant = excluded.merchant, category = excluded.category, \
                 category_confidence = excluded.category_confidence, date = excluded.date, \
                 line_items = excluded.line_items, tax = excluded.tax, \
                 confidence = excluded.confidence, notes = excluded.notes, \
                 is_flagged = excluded.is_flagged, flag_reason = excluded.flag_reason, \
                 updated_at = datetime('now')"
            ),
            params![
                record.expense_id,
                record.user_id,
                record.receipt_id,
                record.amount.to_string(),
                record.merchant,
                record.category.as_str(),
                record.category_confidence,
                record.date,
                line_items,
                record.tax.map(|t| t.to_string()),
                record.confidence,
                record.notes,
                record.is_flagged as i32,
                record.flag_reason,
            ],
        )?;
        debug!(expense = %record.expense_id, user = %record.user_id, "stored expense");
        Ok(())
    }

    fn remove_record(&self, user_id: &str, expense_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM expenses WHERE user_id = ?1 AND expense_id = ?2",
            params![user_id, expense_id],
        )?;
        Ok(())
    }

    fn set_receipt_status(&self, user_id: &str, receipt_id: &str, update: &ReceiptUpdate) -> Result<()> {
        let processed_at = matches!(
            update.status,
            ReceiptStatus::Processed | ReceiptStatus::NeedsReview | ReceiptStatus::Failed
        )
        .then(Utc::now);
        let updated = self.conn.execute(
            "UPDATE receipts SET status = ?3, expense_id = COALESCE(?4, expense_id), \
             error_message = ?5, processed_at = COALESCE(?6, processed_at) \
             WHERE user_id = ?1 AND receipt_id = ?2",
            params![
                user_id,
                receipt_id,
                update.status.as_str(),
                update.expense_id,
                update.error_message,
                processed_at,
            ],
        )?;
        if updated == 0 {
            return Err(SpendError::NotFound(format!("receipt {receipt_id}")));
        }
        debug!(receipt = %receipt_id, status = %update.status, "receipt status changed");
        Ok(())
    }

    fn record_rule_hit(&self, rule_id: i64) -> Result<()> {
        self.conn
            .execute("UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1", [rule_id])?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::reconciler::expense_id_for;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    pub(crate) fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    pub(crate) fn sample_expense(receipt: &str, amount: Decimal, date: &str) -> ExpenseRecord {
        ExpenseRecord {
            expense_id: expense_id_for("alice", receipt),
            user_id: "alice".to_string(),
            receipt_id: Some(receipt.to_string()),
            amount,
            merchant: "Kroger".to_string(),
            category: Category::Groceries,
            category_confidence: 80,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            line_items: vec![LineItem {
                description: "Milk".to_string(),
                quantity: Some(dec!(1)),
                unit_price: Some(dec!(3.49)),
                amount: Some(dec!(3.49)),
            }],
            tax: Some(dec!(0.28)),
            confidence: 92,
            notes: None,
            is_flagged: false,
            flag_reason: None,
        }
    }

    pub(crate) fn sample_receipt(receipt_id: &str, checksum: &str) -> Receipt {
        Receipt {
            user_id: "alice".to_string(),
            receipt_id: receipt_id.to_string(),
            filename: "r.jpg".to_string(),
            stored_path: "/tmp/r.jpg".to_string(),
            checksum: checksum.to_string(),
            status: ReceiptStatus::Pending,
            expense_id: None,
            error_message: None,
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 20, 9, 30, 0).unwrap(),
            processed_at: None,
        }
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, store) = test_store();
        let tables: Vec<String> = store
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["receipts", "expenses", "budgets", "rules"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, store) = test_store();
        init_db(store.conn()).unwrap();
    }

    #[test]
    fn test_resolve_id_prefix() {
        let (_dir, store) = test_store();
        store.insert_receipt(&sample_receipt("abc-111", "c1")).unwrap();
        store.insert_receipt(&sample_receipt("abd-222", "c2")).unwrap();
        assert_eq!(store.resolve_receipt_id("alice", "abc").unwrap(), "abc-111");
        assert_eq!(store.resolve_receipt_id("alice", "abd-222").unwrap(), "abd-222");
        assert!(matches!(
            store.resolve_receipt_id("alice", "ab"),
            Err(SpendError::Validation(_))
        ));
        assert!(matches!(
            store.resolve_receipt_id("bob", "abc"),
            Err(SpendError::NotFound(_))
        ));
        // wildcards are literal
        assert!(store.resolve_receipt_id("alice", "%").is_err());
    }

    #[test]
    fn test_put_and_get_expense_roundtrip() {
        let (_dir, store) = test_store();
        let record = sample_expense("r1", dec!(45.67), "2024-01-15");
        store.put_record(&record).unwrap();
        let loaded = store.get_expense("alice", &record.expense_id).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_put_record_overwrites() {
        let (_dir, store) = test_store();
        let mut record = sample_expense("r1", dec!(45.67), "2024-01-15");
        store.put_record(&record).unwrap();
        record.amount = dec!(50.00);
        store.put_record(&record).unwrap();
        assert_eq!(store.count_expenses("alice", false).unwrap(), 1);
        assert_eq!(store.get_expense("alice", &record.expense_id).unwrap().amount, dec!(50.00));
    }

    #[test]
    fn test_get_records_filters_and_orders() {
        let (_dir, store) = test_store();
        store.put_record(&sample_expense("r1", dec!(10), "2024-01-20")).unwrap();
        store.put_record(&sample_expense("r2", dec!(20), "2024-01-05")).unwrap();
        let mut other = sample_expense("r3", dec!(30), "2024-02-01");
        other.category = Category::Travel;
        other.is_flagged = true;
        store.put_record(&other).unwrap();

        let all = store.get_records("alice", &ExpenseFilter::default()).unwrap();
        let dates: Vec<String> = all.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-05", "2024-01-20", "2024-02-01"]);

        let jan = ExpenseFilter::between(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        assert_eq!(store.get_records("alice", &jan).unwrap().len(), 2);

        let travel = ExpenseFilter { category: Some(Category::Travel), ..ExpenseFilter::default() };
        assert_eq!(store.get_records("alice", &travel).unwrap().len(), 1);

        let flagged = ExpenseFilter { flagged_only: true, ..ExpenseFilter::default() };
        assert_eq!(store.get_records("alice", &flagged).unwrap()[0].category, Category::Travel);

        let newest = ExpenseFilter { newest_first: true, limit: Some(1), ..ExpenseFilter::default() };
        let newest = store.get_records("alice", &newest).unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].date.to_string(), "2024-02-01");

        assert!(store.get_records("bob", &ExpenseFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_delete_expense() {
        let (_dir, store) = test_store();
        let record = sample_expense("r1", dec!(10), "2024-01-20");
        store.put_record(&record).unwrap();
        store.delete_expense("alice", &record.expense_id).unwrap();
        assert!(matches!(
            store.get_expense("alice", &record.expense_id),
            Err(SpendError::NotFound(_))
        ));
        assert!(store.delete_expense("alice", &record.expense_id).is_err());
    }

    #[test]
    fn test_receipt_status_transitions() {
        let (_dir, store) = test_store();
        store.insert_receipt(&sample_receipt("r1", "abc")).unwrap();
        store
            .set_receipt_status("alice", "r1", &ReceiptUpdate::status(ReceiptStatus::Processing))
            .unwrap();
        assert!(store.get_receipt("alice", "r1").unwrap().processed_at.is_none());

        let done = ReceiptUpdate {
            status: ReceiptStatus::Processed,
            expense_id: Some("e1".to_string()),
            error_message: None,
        };
        store.set_receipt_status("alice", "r1", &done).unwrap();
        let receipt = store.get_receipt("alice", "r1").unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Processed);
        assert_eq!(receipt.expense_id.as_deref(), Some("e1"));
        assert!(receipt.processed_at.is_some());
        assert_eq!(receipt.uploaded_at, Utc.with_ymd_and_hms(2024, 1, 20, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_duplicate_checksum_lookup() {
        let (_dir, store) = test_store();
        store.insert_receipt(&sample_receipt("r1", "abc")).unwrap();
        assert!(store.find_receipt_by_checksum("alice", "abc").unwrap().is_some());
        assert!(store.find_receipt_by_checksum("bob", "abc").unwrap().is_none());
        assert!(store.insert_receipt(&sample_receipt("r2", "abc")).is_err());
    }

    #[test]
    fn test_rules_crud_and_hits() {
        let (_dir, store) = test_store();
        let id = store
            .add_rule("alice", "ADOBE", MatchType::Contains, Category::Shopping, 0)
            .unwrap();
        store.record_rule_hit(id).unwrap();
        store.record_rule_hit(id).unwrap();
        let rules = store.list_rules("alice").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].hit_count, 2);
        assert_eq!(rules[0].rule.category, Category::Shopping);

        store.deactivate_rule("alice", id).unwrap();
        assert!(store.active_rules("alice").unwrap().is_empty());
        assert!(store.deactivate_rule("alice", id).is_err());
    }

    #[test]
    fn test_invalid_regex_rule_rejected() {
        let (_dir, store) = test_store();
        let err = store
            .add_rule("alice", "([", MatchType::Regex, Category::Other, 0)
            .unwrap_err();
        assert!(matches!(err, SpendError::Validation(_)));
    }

    #[test]
    fn test_budget_storage() {
        let (_dir, store) = test_store();
        let mut budget = BudgetRecord {
            budget_id: "b1".to_string(),
            user_id: "alice".to_string(),
            category: Category::Groceries,
            amount: dec!(400),
            period: BudgetPeriod::Monthly,
            alert_threshold: 90,
            is_active: true,
        };
        store.insert_budget(&budget).unwrap();
        assert_eq!(store.get_budget("alice", "b1").unwrap(), budget);
        assert!(store
            .find_active_budget("alice", Category::Groceries, BudgetPeriod::Monthly)
            .unwrap()
            .is_some());

        budget.is_active = false;
        store.save_budget(&budget).unwrap();
        assert!(store.list_budgets("alice", true).unwrap().is_empty());
        assert_eq!(store.list_budgets("alice", false).unwrap().len(), 1);
    }
}
