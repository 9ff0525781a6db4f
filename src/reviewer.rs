use tracing::info;

use crate::categorizer::MatchType;
use crate::db::SqliteStore;
use crate::error::{Result, SpendError};
use crate::models::{ExpenseRecord, ExpenseUpdate};
use crate::store::{ExpenseFilter, Store};
use crate::validate::{validate_amount, validate_merchant, validate_notes};

/// Category confidence recorded for a manual choice.
const MANUAL_CONFIDENCE: u8 = 100;

pub fn get_flagged_expenses(store: &SqliteStore, user_id: &str) -> Result<Vec<ExpenseRecord>> {
    store.get_records(
        user_id,
        &ExpenseFilter {
            flagged_only: true,
            ..ExpenseFilter::default()
        },
    )
}

/// Apply a manual edit. The expense leaves the review queue, and when
/// `rule_pattern` is given a `contains` rule mapping it to the final category
/// is created for future receipts.
pub fn apply_review(
    store: &SqliteStore,
    user_id: &str,
    expense_id: &str,
    update: &ExpenseUpdate,
    rule_pattern: Option<&str>,
) -> Result<ExpenseRecord> {
    let mut record = store.get_expense(user_id, expense_id)?;

    if let Some(amount) = update.amount {
        record.amount = validate_amount(amount)?;
    }
    if let Some(merchant) = update.merchant.as_deref() {
        record.merchant = validate_merchant(merchant)?;
    }
    if let Some(date) = update.date {
        record.date = date;
    }
    if let Some(notes) = update.notes.as_deref() {
        let notes = validate_notes(notes)?;
        record.notes = (!notes.is_empty()).then_some(notes);
    }
    if let Some(category) = update.category {
        record.category = category;
        record.category_confidence = MANUAL_CONFIDENCE;
    }
    record.is_flagged = false;
    record.flag_reason = None;

    let pattern = rule_pattern.map(str::trim).filter(|p| !p.is_empty());
    if update.is_empty() && pattern.is_none() {
        return Err(SpendError::Validation("No fields to update".to_string()));
    }

    store.put_record(&record)?;
    if let Some(pattern) = pattern {
        store.add_rule(user_id, pattern, MatchType::Contains, record.category, 0)?;
    }
    info!(expense = %expense_id, user = %user_id, "expense reviewed");
    Ok(record)
}
