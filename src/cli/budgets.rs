use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use spendwise::budgets::{
    budget_alerts, budget_status, create_budget, delete_budget, list_budget_statuses, update_budget,
    BudgetStatus, NewBudget,
};
use spendwise::error::{Result, SpendError};
use spendwise::fmt::{money, percent};
use spendwise::models::{BudgetPeriod, BudgetUpdate};
use spendwise::reports::budget_alert_payload;
use spendwise::sink::{OutboxSink, ReportSink};
use spendwise::validate::{parse_amount, validate_threshold};

use super::{open, parse_category_opt, short_id, today};

pub fn add(user: Option<&str>, category: &str, amount: &str, period: &str, threshold: i64) -> Result<()> {
    let ctx = open(user)?;
    let new = NewBudget {
        category: category.parse()?,
        amount: parse_amount(amount)?,
        period: period.parse()?,
        alert_threshold: validate_threshold(threshold)?,
    };
    let budget = create_budget(&ctx.store, &ctx.user_id, &new)?;
    println!(
        "Added {} budget {}: {} {} (alert at {}%)",
        budget.period,
        short_id(&budget.budget_id),
        budget.category,
        money(budget.amount),
        budget.alert_threshold
    );
    Ok(())
}

fn status_table(statuses: &[BudgetStatus]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Category", "Period", "Budget", "Spent", "Remaining", "Used", "Alert at", "",
    ]);
    for s in statuses {
        let used = percent(s.percentage_used);
        let used = if s.is_over_budget {
            used.red().bold().to_string()
        } else if s.should_alert {
            used.yellow().to_string()
        } else {
            used
        };
        let state = if !s.budget.is_active {
            "inactive"
        } else if s.is_over_budget {
            "OVER"
        } else if s.should_alert {
            "ALERT"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(short_id(&s.budget.budget_id)),
            Cell::new(s.budget.category),
            Cell::new(s.budget.period),
            Cell::new(money(s.budget.amount)).set_alignment(CellAlignment::Right),
            Cell::new(money(s.current_spending)).set_alignment(CellAlignment::Right),
            Cell::new(money(s.remaining)).set_alignment(CellAlignment::Right),
            Cell::new(used).set_alignment(CellAlignment::Right),
            Cell::new(format!("{}%", s.budget.alert_threshold)),
            Cell::new(state),
        ]);
    }
    table
}

pub fn list(user: Option<&str>, all: bool) -> Result<()> {
    let ctx = open(user)?;
    let statuses = list_budget_statuses(&ctx.store, &ctx.user_id, !all, today())?;
    if statuses.is_empty() {
        println!("No budgets. Add one with `spendwise budgets add`.");
        return Ok(());
    }
    println!("Budgets\n{}", status_table(&statuses));
    Ok(())
}

pub fn show(user: Option<&str>, id: &str) -> Result<()> {
    let ctx = open(user)?;
    let budget_id = ctx.store.resolve_budget_id(&ctx.user_id, id)?;
    let s = budget_status(&ctx.store, &ctx.user_id, &budget_id, today())?;

    println!("Budget:     {}", s.budget.budget_id);
    println!("Category:   {}", s.budget.category);
    println!("Period:     {} ({} to {})", s.budget.period, s.window.start, s.window.end);
    println!("Active:     {}", if s.budget.is_active { "yes" } else { "no" });
    println!("Amount:     {}", money(s.budget.amount));
    println!("Spent:      {}", money(s.current_spending));
    println!("Remaining:  {}", money(s.remaining));
    println!("Used:       {}", percent(s.percentage_used));
    println!("Alert at:   {}%", s.budget.alert_threshold);
    if s.is_over_budget {
        println!("{}", "Over budget".red().bold());
    } else if s.should_alert {
        println!("{}", "Alert threshold reached".yellow());
    }
    Ok(())
}

pub fn update(
    user: Option<&str>,
    id: &str,
    category: Option<&str>,
    amount: Option<&str>,
    period: Option<&str>,
    threshold: Option<i64>,
) -> Result<()> {
    let ctx = open(user)?;
    let budget_id = ctx.store.resolve_budget_id(&ctx.user_id, id)?;
    let update = BudgetUpdate {
        category: parse_category_opt(category)?,
        amount: amount.map(parse_amount).transpose()?,
        period: period.map(str::parse::<BudgetPeriod>).transpose()?,
        alert_threshold: threshold.map(validate_threshold).transpose()?,
    };
    if update.category.is_none()
        && update.amount.is_none()
        && update.period.is_none()
        && update.alert_threshold.is_none()
    {
        return Err(SpendError::Validation("No fields to update".to_string()));
    }
    let budget = update_budget(&ctx.store, &ctx.user_id, &budget_id, &update)?;
    println!(
        "Updated budget {}: {} {} {} (alert at {}%)",
        short_id(&budget.budget_id),
        budget.period,
        budget.category,
        money(budget.amount),
        budget.alert_threshold
    );
    Ok(())
}

pub fn delete(user: Option<&str>, id: &str) -> Result<()> {
    let ctx = open(user)?;
    let budget_id = ctx.store.resolve_budget_id(&ctx.user_id, id)?;
    let budget = delete_budget(&ctx.store, &ctx.user_id, &budget_id)?;
    println!(
        "Deactivated {} budget {}: {}",
        budget.period,
        short_id(&budget.budget_id),
        budget.category
    );
    Ok(())
}

pub fn alerts(user: Option<&str>, send: bool, to: Option<&str>) -> Result<()> {
    let ctx = open(user)?;
    let alerts = budget_alerts(&ctx.store, &ctx.user_id, today())?;
    if alerts.is_empty() {
        println!("{}", "No budgets at their alert threshold.".green());
        return Ok(());
    }
    println!("Budget alerts\n{}", status_table(&alerts));

    if send {
        let recipient = to
            .map(str::to_string)
            .or_else(|| ctx.settings.report_recipient.clone())
            .ok_or_else(|| {
                SpendError::Settings("no recipient: pass --to or run `spendwise init --email`".to_string())
            })?;
        let sink = OutboxSink::new(ctx.settings.data_path().join("outbox"));
        for status in &alerts {
            let message_id = sink.deliver(&budget_alert_payload(status), &recipient)?;
            println!("Queued alert for {} to {recipient} ({})", status.budget.category, short_id(&message_id));
        }
    }
    Ok(())
}
