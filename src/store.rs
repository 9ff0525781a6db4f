use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Category, ExpenseRecord, ReceiptUpdate};

/// Query options for `Store::get_records`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub category: Option<Category>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub flagged_only: bool,
    pub limit: Option<usize>,
    /// Newest first instead of oldest first.
    pub newest_first: bool,
}

impl ExpenseFilter {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }
}

/// Keyed record storage used by the processing pipeline.
pub trait Store {
    /// Records for `user_id` matching `filter`, ordered by date then expense id.
    fn get_records(&self, user_id: &str, filter: &ExpenseFilter) -> Result<Vec<ExpenseRecord>>;

    /// Insert or overwrite by (user id, expense id).
    fn put_record(&self, record: &ExpenseRecord) -> Result<()>;

    /// Remove a record if present. Missing records are not an error.
    fn remove_record(&self, user_id: &str, expense_id: &str) -> Result<()>;

    fn set_receipt_status(&self, user_id: &str, receipt_id: &str, update: &ReceiptUpdate) -> Result<()>;

    fn record_rule_hit(&self, rule_id: i64) -> Result<()>;
}
