//! Spending aggregation over a date range.
//!
//! Accumulation goes into ordered maps in one pass, so input order does not
//! matter and callers are not required to sort. Only the top-merchant ranking
//! is sorted explicitly.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::budgets::{evaluate_budgets, BudgetStatus};
use crate::error::{Result, SpendError};
use crate::models::{BudgetRecord, Category, ExpenseRecord};

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(SpendError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending at `end`, inclusive.
    pub fn last_days(end: NaiveDate, days: u32) -> Self {
        let back = i64::from(days.max(1)) - 1;
        Self {
            start: end - Duration::days(back),
            end,
        }
    }

    pub fn month_to_date(as_of: NaiveDate) -> Self {
        Self {
            start: as_of.with_day(1).unwrap_or(as_of),
            end: as_of,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    #[default]
    Month,
}

impl Granularity {
    /// Period bucket key: `2024-01-15`, `2024-W03` (ISO week) or `2024-01`.
    pub fn bucket_key(&self, date: NaiveDate) -> String {
        match self {
            Self::Day => date.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Self::Month => date.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    pub top_merchants: usize,
    pub granularity: Granularity,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            top_merchants: 5,
            granularity: Granularity::Month,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub amount: Decimal,
    pub count: usize,
}

impl Bucket {
    fn add(&mut self, amount: Decimal) {
        self.amount += amount;
        self.count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantTotal {
    pub merchant: String,
    pub amount: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub range: DateRange,
    pub total: Decimal,
    pub count: usize,
    pub average: Decimal,
    pub by_category: BTreeMap<Category, Bucket>,
    pub by_period: BTreeMap<String, Bucket>,
    pub by_day: BTreeMap<NaiveDate, Decimal>,
    pub top_merchants: Vec<MerchantTotal>,
}

impl SummaryResult {
    pub fn category_amount(&self, category: Category) -> Decimal {
        self.by_category
            .get(&category)
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub result: SummaryResult,
    pub budgets: Vec<BudgetStatus>,
}

/// Fold the records inside `range`. Records outside the range are ignored.
///
/// # Panics
///
/// On a record with a negative amount. Reconciled records never carry one, so
/// this indicates a record that bypassed reconciliation.
pub fn aggregate(records: &[ExpenseRecord], range: &DateRange, options: &SummaryOptions) -> SummaryResult {
    let mut total = Decimal::ZERO;
    let mut count = 0usize;
    let mut by_category: BTreeMap<Category, Bucket> = BTreeMap::new();
    let mut by_period: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    let mut by_merchant: HashMap<&str, Bucket> = HashMap::new();

    for record in records.iter().filter(|r| range.contains(r.date)) {
        assert!(
            record.amount >= Decimal::ZERO,
            "expense {} has negative amount {}",
            record.expense_id,
            record.amount
        );
        total += record.amount;
        count += 1;
        by_category.entry(record.category).or_default().add(record.amount);
        by_period
            .entry(options.granularity.bucket_key(record.date))
            .or_default()
            .add(record.amount);
        *by_day.entry(record.date).or_default() += record.amount;
        by_merchant.entry(record.merchant.as_str()).or_default().add(record.amount);
    }

    let average = if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    };

    let mut top_merchants: Vec<MerchantTotal> = by_merchant
        .into_iter()
        .map(|(merchant, bucket)| MerchantTotal {
            merchant: merchant.to_string(),
            amount: bucket.amount,
            count: bucket.count,
        })
        .collect();
    top_merchants.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.merchant.cmp(&b.merchant)));
    top_merchants.truncate(options.top_merchants);

    SummaryResult {
        range: *range,
        total,
        count,
        average,
        by_category,
        by_period,
        by_day,
        top_merchants,
    }
}

/// Aggregate `records` over `range` and evaluate each budget's window ending at `as_of`.
///
/// Budget windows are evaluated against every record passed in, not only the
/// ones inside `range`, so the caller should supply records covering both.
pub fn summarize(
    records: &[ExpenseRecord],
    range: &DateRange,
    budgets: &[BudgetRecord],
    as_of: NaiveDate,
    options: &SummaryOptions,
) -> Summary {
    Summary {
        result: aggregate(records, range, options),
        budgets: evaluate_budgets(records, budgets, as_of),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::BudgetPeriod;
    use rust_decimal_macros::dec;

    pub(crate) fn expense(merchant: &str, category: Category, amount: Decimal, date: &str) -> ExpenseRecord {
        ExpenseRecord {
            expense_id: format!("{merchant}-{date}-{amount}"),
            user_id: "alice".to_string(),
            receipt_id: None,
            amount,
            merchant: merchant.to_string(),
            category,
            category_confidence: 80,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            line_items: Vec::new(),
            tax: None,
            confidence: 90,
            notes: None,
            is_flagged: false,
            flag_reason: None,
        }
    }

    fn january() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_summary() {
        let result = aggregate(&[], &january(), &SummaryOptions::default());
        assert_eq!(result.count, 0);
        assert_eq!(result.total, Decimal::ZERO);
        assert_eq!(result.average, Decimal::ZERO);
        assert!(result.by_category.is_empty());
        assert!(result.top_merchants.is_empty());
    }

    #[test]
    fn test_groceries_in_january() {
        let records = vec![
            expense("Kroger", Category::Groceries, dec!(10), "2024-01-03"),
            expense("Kroger", Category::Groceries, dec!(20), "2024-01-10"),
            expense("Aldi", Category::Groceries, dec!(30), "2024-01-20"),
        ];
        let result = aggregate(&records, &january(), &SummaryOptions::default());
        assert_eq!(result.category_amount(Category::Groceries), dec!(60));
        assert_eq!(result.by_category[&Category::Groceries].count, 3);
        assert_eq!(result.count, 3);
        assert_eq!(result.average, dec!(20));
        assert_eq!(result.by_period["2024-01"].amount, dec!(60));
    }

    #[test]
    fn test_records_outside_range_ignored() {
        let records = vec![
            expense("Kroger", Category::Groceries, dec!(10), "2023-12-31"),
            expense("Kroger", Category::Groceries, dec!(20), "2024-01-31"),
            expense("Kroger", Category::Groceries, dec!(40), "2024-02-01"),
        ];
        let result = aggregate(&records, &january(), &SummaryOptions::default());
        assert_eq!(result.count, 1);
        assert_eq!(result.total, dec!(20));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut records = vec![
            expense("Shell", Category::Transportation, dec!(40), "2024-01-05"),
            expense("Kroger", Category::Groceries, dec!(10), "2024-01-03"),
            expense("Netflix", Category::Entertainment, dec!(15.49), "2024-01-28"),
        ];
        let a = aggregate(&records, &january(), &SummaryOptions::default());
        records.reverse();
        let b = aggregate(&records, &january(), &SummaryOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_top_merchants_ranking_and_ties() {
        let records = vec![
            expense("Zed's", Category::FoodAndDining, dec!(25), "2024-01-02"),
            expense("Alpha", Category::FoodAndDining, dec!(25), "2024-01-03"),
            expense("Big", Category::Shopping, dec!(100), "2024-01-04"),
            expense("Small", Category::Shopping, dec!(1), "2024-01-04"),
            expense("Alpha", Category::FoodAndDining, dec!(0), "2024-01-05"),
        ];
        let options = SummaryOptions { top_merchants: 3, ..SummaryOptions::default() };
        let result = aggregate(&records, &january(), &options);
        let names: Vec<&str> = result.top_merchants.iter().map(|m| m.merchant.as_str()).collect();
        assert_eq!(names, vec!["Big", "Alpha", "Zed's"]);
        assert_eq!(result.top_merchants[1].count, 2);
    }

    #[test]
    fn test_average_is_rounded() {
        let records = vec![
            expense("A", Category::Other, dec!(10), "2024-01-02"),
            expense("B", Category::Other, dec!(10), "2024-01-02"),
            expense("C", Category::Other, dec!(0.01), "2024-01-02"),
        ];
        let result = aggregate(&records, &january(), &SummaryOptions::default());
        assert_eq!(result.average, dec!(6.67));
    }

    #[test]
    fn test_week_and_day_buckets() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(Granularity::Day.bucket_key(d), "2024-01-15");
        assert_eq!(Granularity::Week.bucket_key(d), "2024-W03");
        assert_eq!(Granularity::Month.bucket_key(d), "2024-01");
        // ISO week of Jan 1st 2021 belongs to 2020.
        let d = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(Granularity::Week.bucket_key(d), "2020-W53");
    }

    #[test]
    fn test_date_range_validation() {
        let a = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(DateRange::new(a, b).is_err());
        assert_eq!(DateRange::last_days(a, 7).start, NaiveDate::from_ymd_opt(2024, 1, 26).unwrap());
        assert_eq!(DateRange::last_days(a, 7).days(), 7);
        assert_eq!(DateRange::month_to_date(a).days(), 1);
    }

    #[test]
    fn test_summarize_includes_budget_flags() {
        let records = vec![
            expense("Kroger", Category::Groceries, dec!(60), "2024-01-10"),
            expense("Kroger", Category::Groceries, dec!(35), "2024-01-12"),
        ];
        let budgets = vec![BudgetRecord {
            budget_id: "b1".to_string(),
            user_id: "alice".to_string(),
            category: Category::Groceries,
            amount: dec!(100),
            period: BudgetPeriod::Monthly,
            alert_threshold: 90,
            is_active: true,
        }];
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let summary = summarize(&records, &january(), &budgets, as_of, &SummaryOptions::default());
        assert_eq!(summary.result.total, dec!(95));
        assert_eq!(summary.budgets.len(), 1);
        assert!(summary.budgets[0].should_alert);
    }

    #[test]
    #[should_panic(expected = "negative amount")]
    fn test_negative_amount_is_contract_violation() {
        let records = vec![expense("Bad", Category::Other, dec!(-1), "2024-01-02")];
        aggregate(&records, &january(), &SummaryOptions::default());
    }
}
