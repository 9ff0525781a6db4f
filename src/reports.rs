use std::fmt::Write as _;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::budgets::{earliest_window_start, evaluate_budgets, BudgetStatus};
use crate::db::SqliteStore;
use crate::error::{Result, SpendError};
use crate::fmt::{money, percent};
use crate::models::{BudgetRecord, Category, ExpenseRecord};
use crate::sink::{Attachment, ReportPayload};
use crate::store::{ExpenseFilter, Store};
use crate::summary::{aggregate, DateRange, SummaryOptions, SummaryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Weekly,
    Monthly,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }
}

/// Weekly covers the last seven days ending `as_of`; monthly runs from the first
/// of the month to `as_of`.
pub fn report_range(kind: ReportKind, as_of: NaiveDate) -> DateRange {
    match kind {
        ReportKind::Weekly => DateRange::last_days(as_of, 7),
        ReportKind::Monthly => DateRange::month_to_date(as_of),
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub amount: Decimal,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub user_id: String,
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub summary: SummaryResult,
    /// Largest share first.
    pub categories: Vec<CategoryShare>,
    pub average_daily: Decimal,
    /// One entry per day of the range, zero-filled.
    pub daily: Vec<(NaiveDate, Decimal)>,
    pub budgets: Vec<BudgetStatus>,
}

pub fn build_report(
    user_id: &str,
    kind: ReportKind,
    records: &[ExpenseRecord],
    budgets: &[BudgetRecord],
    as_of: NaiveDate,
    options: &SummaryOptions,
) -> Report {
    let range = report_range(kind, as_of);
    let summary = aggregate(records, &range, options);

    let mut categories: Vec<CategoryShare> = summary
        .by_category
        .iter()
        .map(|(category, bucket)| CategoryShare {
            category: *category,
            amount: bucket.amount,
            count: bucket.count,
            percentage: share(bucket.amount, summary.total),
        })
        .collect();
    categories.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.category.cmp(&b.category)));

    let average_daily = (summary.total / Decimal::from(range.days())).round_dp(2);

    let daily = (0..range.days())
        .map(|offset| {
            let day = range.start + Duration::days(offset);
            (day, summary.by_day.get(&day).copied().unwrap_or(Decimal::ZERO))
        })
        .collect();

    Report {
        kind,
        user_id: user_id.to_string(),
        range,
        generated_at: Utc::now(),
        summary,
        categories,
        average_daily,
        daily,
        budgets: evaluate_budgets(records, budgets, as_of),
    }
}

fn share(amount: Decimal, total: Decimal) -> f64 {
    if total <= Decimal::ZERO {
        return 0.0;
    }
    (amount / total * Decimal::ONE_HUNDRED)
        .round_dp(2)
        .to_f64()
        .unwrap_or(0.0)
}

/// Load what a report needs from the store and build it.
pub fn generate(
    store: &SqliteStore,
    user_id: &str,
    kind: ReportKind,
    as_of: NaiveDate,
    options: &SummaryOptions,
) -> Result<Report> {
    let range = report_range(kind, as_of);
    let budgets = store.list_budgets(user_id, true)?;
    // Budget windows may start before the report range.
    let from = earliest_window_start(&budgets, as_of).map_or(range.start, |start| start.min(range.start));
    let records = store.get_records(user_id, &ExpenseFilter::between(from, as_of))?;
    Ok(build_report(user_id, kind, &records, &budgets, as_of, options))
}

// ---------------------------------------------------------------------------
// Rendering and delivery
// ---------------------------------------------------------------------------

pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let s = &report.summary;
    let _ = writeln!(
        out,
        "{} expense report: {} to {}",
        report.kind.title(),
        report.range.start,
        report.range.end
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Total spent:      {}", money(s.total));
    let _ = writeln!(out, "Expenses:         {}", s.count);
    let _ = writeln!(out, "Average expense:  {}", money(s.average));
    let _ = writeln!(out, "Average per day:  {}", money(report.average_daily));

    if !report.categories.is_empty() {
        let _ = writeln!(out, "\nBy category");
        for c in &report.categories {
            let _ = writeln!(
                out,
                "  {:<16} {:>12}  {:>3} items  {:>6}",
                c.category.as_str(),
                money(c.amount),
                c.count,
                percent(c.percentage)
            );
        }
    }

    if !s.top_merchants.is_empty() {
        let _ = writeln!(out, "\nTop merchants");
        for m in &s.top_merchants {
            let _ = writeln!(out, "  {:<24} {:>12}  {:>3} items", m.merchant, money(m.amount), m.count);
        }
    }

    if !report.budgets.is_empty() {
        let _ = writeln!(out, "\nBudgets");
        for b in &report.budgets {
            let _ = writeln!(
                out,
                "  {:<16} {:<8} {:>12} of {:>12}  {:>7}{}",
                b.budget.category.as_str(),
                b.budget.period.as_str(),
                money(b.current_spending),
                money(b.budget.amount),
                percent(b.percentage_used),
                if b.should_alert { "  ALERT" } else { "" }
            );
        }
    }
    out
}

pub fn report_payload(report: &Report, csv: Vec<u8>) -> ReportPayload {
    ReportPayload {
        subject: format!("Your {} Expense Report", report.kind.title()),
        body: render_text(report),
        attachments: vec![Attachment {
            filename: format!("expenses-{}-{}.csv", report.range.start, report.range.end),
            content: csv,
        }],
    }
}

pub fn budget_alert_payload(status: &BudgetStatus) -> ReportPayload {
    let b = &status.budget;
    let body = format!(
        "Your {} budget for this {} period has reached {} of the allocated amount.\n\n\
         Budget:        {}\nSpent:         {}\nRemaining:     {}\nWindow:        {} to {}\n",
        b.category,
        b.period,
        percent(status.percentage_used),
        money(b.amount),
        money(status.current_spending),
        money(status.remaining),
        status.window.start,
        status.window.end,
    );
    ReportPayload {
        subject: format!("Budget Alert: {} - {:.0}% Used", b.category, status.percentage_used),
        body,
        attachments: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// CSV of `records` sorted by date.
pub fn export_csv(records: &[ExpenseRecord]) -> Result<Vec<u8>> {
    let mut sorted: Vec<&ExpenseRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.expense_id.cmp(&b.expense_id)));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Date", "Merchant", "Category", "Amount", "Items", "Receipt ID"])?;
    for r in sorted {
        let items = r
            .line_items
            .iter()
            .map(|i| i.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        writer.write_record([
            r.date.format("%Y-%m-%d").to_string(),
            r.merchant.clone(),
            r.category.as_str().to_string(),
            format!("${:.2}", r.amount),
            items,
            r.receipt_id.clone().unwrap_or_default(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| SpendError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{sample_expense, test_store};
    use crate::models::BudgetPeriod;
    use crate::summary::tests::expense;
    use rust_decimal_macros::dec;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_report_ranges() {
        let weekly = report_range(ReportKind::Weekly, day("2024-01-18"));
        assert_eq!(weekly.start, day("2024-01-12"));
        assert_eq!(weekly.days(), 7);
        let monthly = report_range(ReportKind::Monthly, day("2024-01-18"));
        assert_eq!(monthly.start, day("2024-01-01"));
        assert_eq!(monthly.days(), 18);
    }

    #[test]
    fn test_build_weekly_report() {
        let records = vec![
            expense("Kroger", Category::Groceries, dec!(30), "2024-01-15"),
            expense("Shell", Category::Transportation, dec!(10), "2024-01-16"),
            expense("Old", Category::Shopping, dec!(500), "2024-01-02"),
        ];
        let report = build_report("alice", ReportKind::Weekly, &records, &[], day("2024-01-18"), &SummaryOptions::default());
        assert_eq!(report.summary.total, dec!(40));
        assert_eq!(report.summary.count, 2);
        assert_eq!(report.categories[0].category, Category::Groceries);
        assert_eq!(report.categories[0].percentage, 75.0);
        assert_eq!(report.categories[1].percentage, 25.0);
        assert_eq!(report.average_daily, dec!(5.71));
        assert_eq!(report.daily.len(), 7);
        assert_eq!(report.daily[3], (day("2024-01-15"), dec!(30)));
        assert_eq!(report.daily[0].1, Decimal::ZERO);
    }

    #[test]
    fn test_empty_report() {
        let report = build_report("alice", ReportKind::Monthly, &[], &[], day("2024-01-01"), &SummaryOptions::default());
        assert_eq!(report.summary.count, 0);
        assert_eq!(report.average_daily, Decimal::ZERO);
        assert!(report.categories.is_empty());
        assert!(render_text(&report).contains("Total spent:      $0.00"));
    }

    #[test]
    fn test_generate_includes_monthly_budget_outside_week() {
        let (_dir, store) = test_store();
        store.put_record(&sample_expense("r1", dec!(180), "2024-01-03")).unwrap();
        store.put_record(&sample_expense("r2", dec!(10), "2024-01-17")).unwrap();
        store
            .insert_budget(&BudgetRecord {
                budget_id: "b1".to_string(),
                user_id: "alice".to_string(),
                category: Category::Groceries,
                amount: dec!(200),
                period: BudgetPeriod::Monthly,
                alert_threshold: 90,
                is_active: true,
            })
            .unwrap();
        let report = generate(&store, "alice", ReportKind::Weekly, day("2024-01-18"), &SummaryOptions::default()).unwrap();
        assert_eq!(report.summary.total, dec!(10));
        assert_eq!(report.budgets[0].current_spending, dec!(190));
        assert!(report.budgets[0].should_alert);
        assert!(render_text(&report).contains("ALERT"));
    }

    #[test]
    fn test_generate_weekly_budget_reaching_into_previous_month() {
        let (_dir, store) = test_store();
        // 2024-02-01 is a Thursday, so the week began on 2024-01-29.
        store.put_record(&sample_expense("r1", dec!(95), "2024-01-30")).unwrap();
        store
            .insert_budget(&BudgetRecord {
                budget_id: "b1".to_string(),
                user_id: "alice".to_string(),
                category: Category::Groceries,
                amount: dec!(100),
                period: BudgetPeriod::Weekly,
                alert_threshold: 90,
                is_active: true,
            })
            .unwrap();
        let report = generate(&store, "alice", ReportKind::Monthly, day("2024-02-01"), &SummaryOptions::default()).unwrap();
        assert_eq!(report.summary.total, Decimal::ZERO);
        assert_eq!(report.budgets[0].window.start, day("2024-01-29"));
        assert_eq!(report.budgets[0].current_spending, dec!(95));
        assert!(report.budgets[0].should_alert);

        let direct = crate::budgets::budget_status(&store, "alice", "b1", day("2024-02-01")).unwrap();
        assert_eq!(direct, report.budgets[0]);
    }

    #[test]
    fn test_export_csv() {
        let mut late = sample_expense("r2", dec!(5), "2024-01-20");
        late.merchant = "Joe's, Diner".to_string();
        let early = sample_expense("r1", dec!(45.6), "2024-01-15");
        let csv = String::from_utf8(export_csv(&[late, early]).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Merchant,Category,Amount,Items,Receipt ID");
        assert_eq!(lines[1], "2024-01-15,Kroger,Groceries,$45.60,Milk,r1");
        assert_eq!(lines[2], "2024-01-20,\"Joe's, Diner\",Groceries,$5.00,Milk,r2");
    }

    #[test]
    fn test_payloads() {
        let report = build_report("alice", ReportKind::Monthly, &[], &[], day("2024-01-18"), &SummaryOptions::default());
        let payload = report_payload(&report, b"x".to_vec());
        assert_eq!(payload.subject, "Your Monthly Expense Report");
        assert_eq!(payload.attachments[0].filename, "expenses-2024-01-01-2024-01-18.csv");

        let records = vec![expense("Kroger", Category::Groceries, dec!(95), "2024-01-10")];
        let budgets = vec![BudgetRecord {
            budget_id: "b1".to_string(),
            user_id: "alice".to_string(),
            category: Category::Groceries,
            amount: dec!(100),
            period: BudgetPeriod::Monthly,
            alert_threshold: 90,
            is_active: true,
        }];
        let status = &evaluate_budgets(&records, &budgets, day("2024-01-18"))[0];
        let alert = budget_alert_payload(status);
        assert_eq!(alert.subject, "Budget Alert: Groceries - 95% Used");
        assert!(alert.body.contains("95.0%"));
    }
}
