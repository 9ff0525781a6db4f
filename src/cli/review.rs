use std::io::{BufRead, Write};

use colored::Colorize;
use comfy_table::{Cell, Table};

use spendwise::error::Result;
use spendwise::fmt::money;
use spendwise::models::{Category, ExpenseUpdate};
use spendwise::reconciler::UNKNOWN_MERCHANT;
use spendwise::reviewer::{apply_review, get_flagged_expenses};
use spendwise::validate::parse_amount;

use super::open;

/// Print `label`, read one line. `None` once input is exhausted.
fn prompt(input: &mut impl BufRead, label: &str) -> Result<Option<String>> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub fn run(user: Option<&str>) -> Result<()> {
    let ctx = open(user)?;
    let flagged = get_flagged_expenses(&ctx.store, &ctx.user_id)?;

    if flagged.is_empty() {
        println!("{}", "No expenses to review.".green());
        return Ok(());
    }

    println!("\n{} expenses to review\n", flagged.len());

    let mut cat_table = Table::new();
    cat_table.set_header(vec!["#", "Category"]);
    for (i, cat) in Category::ALL.iter().enumerate() {
        cat_table.add_row(vec![Cell::new(i + 1), Cell::new(cat)]);
    }
    println!("Categories\n{cat_table}\n");

    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    for expense in &flagged {
        println!("{}", "\u{2500}".repeat(60));
        println!("  Date:      {}", expense.date);
        println!("  Merchant:  {}", expense.merchant);
        println!("  Amount:    {}", money(expense.amount));
        println!("  Category:  {} ({}%)", expense.category, expense.category_confidence);
        if let Some(reason) = &expense.flag_reason {
            println!("  Why:       {}", reason.yellow());
        }
        println!();

        let Some(choice) = prompt(&mut input, "Category # (Enter=keep, s=skip, q=quit)")? else {
            break;
        };
        match choice.to_lowercase().as_str() {
            "q" => {
                println!("{}", "Review paused.".yellow());
                return Ok(());
            }
            "s" => continue,
            _ => {}
        }
        let category = if choice.is_empty() {
            expense.category
        } else {
            match choice.parse::<usize>() {
                Ok(n) if (1..=Category::ALL.len()).contains(&n) => Category::ALL[n - 1],
                _ => {
                    println!("{}", "Invalid choice, skipping.".red());
                    continue;
                }
            }
        };

        let mut update = ExpenseUpdate {
            category: Some(category),
            ..ExpenseUpdate::default()
        };

        let amount = prompt(&mut input, &format!("Amount [{}]", money(expense.amount)))?.unwrap_or_default();
        if !amount.is_empty() {
            match parse_amount(&amount) {
                Ok(value) => update.amount = Some(value),
                Err(e) => {
                    println!("{}", format!("{e}, skipping.").red());
                    continue;
                }
            }
        }

        let merchant = prompt(&mut input, &format!("Merchant [{}]", expense.merchant))?.unwrap_or_default();
        if !merchant.is_empty() {
            update.merchant = Some(merchant);
        }

        let final_merchant = update.merchant.as_deref().unwrap_or(&expense.merchant);
        let mut rule_pattern = None;
        if final_merchant != UNKNOWN_MERCHANT {
            let answer = prompt(&mut input, "Create rule for future matches? [y/N]")?.unwrap_or_default();
            if answer.eq_ignore_ascii_case("y") {
                let suggested = final_merchant.to_uppercase();
                let pattern = prompt(&mut input, &format!("Rule pattern [{suggested}]"))?.unwrap_or_default();
                rule_pattern = Some(if pattern.is_empty() { suggested } else { pattern });
            }
        }

        match apply_review(
            &ctx.store,
            &ctx.user_id,
            &expense.expense_id,
            &update,
            rule_pattern.as_deref(),
        ) {
            Ok(record) => println!(
                "{}",
                format!("\u{2192} {} {} as {}", record.merchant, money(record.amount), record.category).green()
            ),
            Err(e) => println!("{}", format!("Not saved: {e}").red()),
        }
        println!();
    }

    println!("{}", "Review complete!".green());
    Ok(())
}
