use comfy_table::{Cell, CellAlignment, Table};

use spendwise::budgets::earliest_window_start;
use spendwise::error::Result;
use spendwise::fmt::{money, percent};
use spendwise::store::{ExpenseFilter, Store};
use spendwise::summary::{summarize, DateRange, Granularity};

use super::{open, parse_date_opt, today};

pub fn run(
    user: Option<&str>,
    from_date: Option<&str>,
    to_date: Option<&str>,
    days: Option<u32>,
    granularity: Granularity,
    top: Option<usize>,
    json: bool,
) -> Result<()> {
    let ctx = open(user)?;
    let end = parse_date_opt(to_date)?.unwrap_or_else(today);
    let range = match parse_date_opt(from_date)? {
        Some(start) => DateRange::new(start, end)?,
        None => DateRange::last_days(end, days.unwrap_or(ctx.settings.summary_window_days)),
    };

    let mut options = ctx.summary_options();
    options.granularity = granularity;
    if let Some(top) = top {
        options.top_merchants = top;
    }

    let budgets = ctx.store.list_budgets(&ctx.user_id, true)?;
    // Budget windows end at `end` but may start before the summary range.
    let from = earliest_window_start(&budgets, end).map_or(range.start, |start| start.min(range.start));
    let records = ctx
        .store
        .get_records(&ctx.user_id, &ExpenseFilter::between(from, range.end))?;
    let summary = summarize(&records, &range, &budgets, end, &options);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let r = &summary.result;
    println!("Spending {} to {}", r.range.start, r.range.end);
    println!("Total:     {}", money(r.total));
    println!("Expenses:  {}", r.count);
    println!("Average:   {}", money(r.average));

    if !r.by_category.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Category", "Count", "Amount"]);
        for (category, bucket) in &r.by_category {
            table.add_row(vec![
                Cell::new(category),
                Cell::new(bucket.count),
                Cell::new(money(bucket.amount)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("\nBy category\n{table}");

        let mut table = Table::new();
        table.set_header(vec!["Period", "Count", "Amount"]);
        for (key, bucket) in &r.by_period {
            table.add_row(vec![
                Cell::new(key),
                Cell::new(bucket.count),
                Cell::new(money(bucket.amount)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("\nBy period\n{table}");

        let mut table = Table::new();
        table.set_header(vec!["Merchant", "Count", "Amount"]);
        for m in &r.top_merchants {
            table.add_row(vec![
                Cell::new(&m.merchant),
                Cell::new(m.count),
                Cell::new(money(m.amount)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("\nTop merchants\n{table}");
    }

    if !summary.budgets.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Budget", "Period", "Spent", "Limit", "Used"]);
        for s in &summary.budgets {
            table.add_row(vec![
                Cell::new(s.budget.category),
                Cell::new(s.budget.period),
                Cell::new(money(s.current_spending)).set_alignment(CellAlignment::Right),
                Cell::new(money(s.budget.amount)).set_alignment(CellAlignment::Right),
                Cell::new(percent(s.percentage_used)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("\nBudgets\n{table}");
    }
    Ok(())
}
