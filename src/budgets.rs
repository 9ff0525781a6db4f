use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::SqliteStore;
use crate::error::{Result, SpendError};
use crate::models::{BudgetPeriod, BudgetRecord, BudgetUpdate, Category, ExpenseRecord};
use crate::store::{ExpenseFilter, Store};
use crate::summary::DateRange;
use crate::validate::{validate_amount, validate_threshold};

pub const DEFAULT_ALERT_THRESHOLD: u8 = 90;

/// Current window of a budget period ending at `as_of`: Monday of this week, or
/// the first of this month.
pub fn period_window(period: BudgetPeriod, as_of: NaiveDate) -> DateRange {
    let start = match period {
        BudgetPeriod::Weekly => {
            as_of - Duration::days(i64::from(as_of.weekday().num_days_from_monday()))
        }
        BudgetPeriod::Monthly => as_of.with_day(1).unwrap_or(as_of),
    };
    DateRange { start, end: as_of }
}

/// Earliest date any of `budgets` looks at when evaluated on `as_of`.
pub fn earliest_window_start(budgets: &[BudgetRecord], as_of: NaiveDate) -> Option<NaiveDate> {
    budgets
        .iter()
        .map(|b| period_window(b.period, as_of).start)
        .min()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub budget: BudgetRecord,
    pub window: DateRange,
    pub current_spending: Decimal,
    pub remaining: Decimal,
    pub percentage_used: f64,
    pub is_over_budget: bool,
    pub should_alert: bool,
}

impl BudgetStatus {
    pub fn evaluate(budget: &BudgetRecord, current_spending: Decimal, window: DateRange) -> Self {
        let exact = if budget.amount > Decimal::ZERO {
            current_spending / budget.amount * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        let is_over_budget = budget.amount > Decimal::ZERO && current_spending > budget.amount;
        // Alert on the unrounded percentage; rounding only affects what is reported.
        let should_alert = budget.is_active
            && budget.amount > Decimal::ZERO
            && exact >= Decimal::from(budget.alert_threshold);
        let percentage_used = exact.round_dp(2).to_f64().unwrap_or(0.0);
        Self {
            budget: budget.clone(),
            window,
            current_spending,
            remaining: budget.amount - current_spending,
            percentage_used,
            is_over_budget,
            should_alert,
        }
    }
}

/// Spending in `budget`'s category within `window`.
pub fn spending_for(records: &[ExpenseRecord], budget: &BudgetRecord, window: &DateRange) -> Decimal {
    records
        .iter()
        .filter(|r| r.category == budget.category && window.contains(r.date))
        .map(|r| r.amount)
        .sum()
}

pub fn evaluate_budgets(
    records: &[ExpenseRecord],
    budgets: &[BudgetRecord],
    as_of: NaiveDate,
) -> Vec<BudgetStatus> {
    budgets
        .iter()
        .map(|budget| {
            let window = period_window(budget.period, as_of);
            let spending = spending_for(records, budget, &window);
            BudgetStatus::evaluate(budget, spending, window)
        })
        .collect()
}

pub fn alerts(statuses: Vec<BudgetStatus>) -> Vec<BudgetStatus> {
    statuses.into_iter().filter(|s| s.should_alert).collect()
}

// ---------------------------------------------------------------------------
// Budget management
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub category: Category,
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub alert_threshold: u8,
}

fn ensure_no_active_duplicate(
    store: &SqliteStore,
    user_id: &str,
    category: Category,
    period: BudgetPeriod,
    except: Option<&str>,
) -> Result<()> {
    match store.find_active_budget(user_id, category, period)? {
        Some(existing) if Some(existing.budget_id.as_str()) != except => Err(SpendError::Duplicate(format!(
            "an active {period} budget for {category} ({})",
            existing.budget_id
        ))),
        _ => Ok(()),
    }
}

pub fn create_budget(store: &SqliteStore, user_id: &str, new: &NewBudget) -> Result<BudgetRecord> {
    let amount = validate_amount(new.amount)?;
    let alert_threshold = validate_threshold(i64::from(new.alert_threshold))?;
    ensure_no_active_duplicate(store, user_id, new.category, new.period, None)?;

    let budget = BudgetRecord {
        budget_id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        category: new.category,
        amount,
        period: new.period,
        alert_threshold,
        is_active: true,
    };
    store.insert_budget(&budget)?;
    info!(budget = %budget.budget_id, category = %budget.category, period = %budget.period, "budget created");
    Ok(budget)
}

pub fn update_budget(
    store: &SqliteStore,
    user_id: &str,
    budget_id: &str,
    update: &BudgetUpdate,
) -> Result<BudgetRecord> {
    let mut budget = store.get_budget(user_id, budget_id)?;
    if let Some(amount) = update.amount {
        budget.amount = validate_amount(amount)?;
    }
    if let Some(threshold) = update.alert_threshold {
        budget.alert_threshold = validate_threshold(i64::from(threshold))?;
    }
    if let Some(category) = update.category {
        budget.category = category;
    }
    if let Some(period) = update.period {
        budget.period = period;
    }
    if budget.is_active {
        ensure_no_active_duplicate(store, user_id, budget.category, budget.period, Some(budget_id))?;
    }
    store.save_budget(&budget)?;
    Ok(budget)
}

/// Budgets are never removed, only deactivated.
pub fn delete_budget(store: &SqliteStore, user_id: &str, budget_id: &str) -> Result<BudgetRecord> {
    let mut budget = store.get_budget(user_id, budget_id)?;
    budget.is_active = false;
    store.save_budget(&budget)?;
    info!(budget = %budget_id, "budget deactivated");
    Ok(budget)
}

pub fn budget_status(store: &SqliteStore, user_id: &str, budget_id: &str, as_of: NaiveDate) -> Result<BudgetStatus> {
    let budget = store.get_budget(user_id, budget_id)?;
    status_from_store(store, &budget, as_of)
}

pub fn list_budget_statuses(
    store: &SqliteStore,
    user_id: &str,
    active_only: bool,
    as_of: NaiveDate,
) -> Result<Vec<BudgetStatus>> {
    store
        .list_budgets(user_id, active_only)?
        .iter()
        .map(|budget| status_from_store(store, budget, as_of))
        .collect()
}

pub fn budget_alerts(store: &SqliteStore, user_id: &str, as_of: NaiveDate) -> Result<Vec<BudgetStatus>> {
    Ok(alerts(list_budget_statuses(store, user_id, true, as_of)?))
}

fn status_from_store(store: &SqliteStore, budget: &BudgetRecord, as_of: NaiveDate) -> Result<BudgetStatus> {
    let window = period_window(budget.period, as_of);
    let filter = ExpenseFilter {
        category: Some(budget.category),
        ..ExpenseFilter::between(window.start, window.end)
    };
    let records = store.get_records(&budget.user_id, &filter)?;
    Ok(BudgetStatus::evaluate(budget, spending_for(&records, budget, &window), window))
}
