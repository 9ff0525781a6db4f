use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use spendwise::error::Result;
use spendwise::fmt::money;
use spendwise::models::{ExpenseRecord, ExpenseUpdate};
use spendwise::reviewer::apply_review;
use spendwise::store::{ExpenseFilter, Store};
use spendwise::validate::{parse_amount, parse_date};

use super::{open, parse_category_opt, parse_date_opt, short_id};

pub fn list(
    user: Option<&str>,
    category: Option<&str>,
    from_date: Option<&str>,
    to_date: Option<&str>,
    flagged: bool,
    limit: usize,
) -> Result<()> {
    let ctx = open(user)?;
    let filter = ExpenseFilter {
        category: parse_category_opt(category)?,
        from: parse_date_opt(from_date)?,
        to: parse_date_opt(to_date)?,
        flagged_only: flagged,
        limit: Some(limit),
        newest_first: true,
    };
    let records = ctx.store.get_records(&ctx.user_id, &filter)?;
    if records.is_empty() {
        println!("No expenses.");
        return Ok(());
    }
    println!("Expenses\n{}", expense_table(&records));
    Ok(())
}

pub(crate) fn expense_table(records: &[ExpenseRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Merchant", "Category", "Amount", "Flag"]);
    for r in records {
        table.add_row(vec![
            Cell::new(short_id(&r.expense_id)),
            Cell::new(r.date),
            Cell::new(&r.merchant),
            Cell::new(r.category),
            Cell::new(money(r.amount)).set_alignment(CellAlignment::Right),
            Cell::new(if r.is_flagged { "\u{2691}" } else { "" }),
        ]);
    }
    table
}

pub fn show(user: Option<&str>, id: &str) -> Result<()> {
    let ctx = open(user)?;
    let expense_id = ctx.store.resolve_expense_id(&ctx.user_id, id)?;
    let r = ctx.store.get_expense(&ctx.user_id, &expense_id)?;

    println!("Expense:     {}", r.expense_id);
    println!("Date:        {}", r.date);
    println!("Merchant:    {}", r.merchant);
    println!("Amount:      {}", money(r.amount));
    if let Some(tax) = r.tax {
        println!("Tax:         {}", money(tax));
    }
    println!("Category:    {} ({}%)", r.category, r.category_confidence);
    println!("Confidence:  {}%", r.confidence);
    if let Some(receipt_id) = &r.receipt_id {
        println!("Receipt:     {receipt_id}");
    }
    if let Some(notes) = &r.notes {
        println!("Notes:       {notes}");
    }
    if r.is_flagged {
        println!(
            "{}     {}",
            "Review:".yellow(),
            r.flag_reason.as_deref().unwrap_or("flagged")
        );
    }

    if !r.line_items.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Item", "Qty", "Unit", "Amount"]);
        for item in &r.line_items {
            table.add_row(vec![
                Cell::new(&item.description),
                Cell::new(item.quantity.map(|q| q.normalize().to_string()).unwrap_or_default()),
                Cell::new(item.unit_price.map(money).unwrap_or_default()),
                Cell::new(item.amount.map(money).unwrap_or_default()).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("\n{table}");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn update(
    user: Option<&str>,
    id: &str,
    amount: Option<&str>,
    merchant: Option<String>,
    category: Option<&str>,
    date: Option<&str>,
    notes: Option<String>,
    remember: bool,
) -> Result<()> {
    let ctx = open(user)?;
    let expense_id = ctx.store.resolve_expense_id(&ctx.user_id, id)?;
    let update = ExpenseUpdate {
        amount: amount.map(parse_amount).transpose()?,
        merchant,
        category: parse_category_opt(category)?,
        date: date.map(parse_date).transpose()?,
        notes,
    };

    let rule_pattern = if remember {
        let current = ctx.store.get_expense(&ctx.user_id, &expense_id)?;
        Some(
            update
                .merchant
                .clone()
                .unwrap_or(current.merchant)
                .trim()
                .to_uppercase(),
        )
    } else {
        None
    };

    let record = apply_review(&ctx.store, &ctx.user_id, &expense_id, &update, rule_pattern.as_deref())?;
    println!(
        "Updated {}: {} {} \u{2192} {}",
        short_id(&record.expense_id),
        record.merchant,
        money(record.amount),
        record.category
    );
    if let Some(pattern) = rule_pattern {
        println!("Added rule: '{pattern}' \u{2192} {}", record.category);
    }
    Ok(())
}

pub fn delete(user: Option<&str>, id: &str) -> Result<()> {
    let ctx = open(user)?;
    let expense_id = ctx.store.resolve_expense_id(&ctx.user_id, id)?;
    let record = ctx.store.get_expense(&ctx.user_id, &expense_id)?;
    ctx.store.delete_expense(&ctx.user_id, &expense_id)?;
    println!(
        "Deleted expense {}: {} {}",
        short_id(&expense_id),
        record.merchant,
        money(record.amount)
    );
    Ok(())
}
