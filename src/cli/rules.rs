use comfy_table::{Cell, Table};

use spendwise::categorizer::MatchType;
use spendwise::error::{Result, SpendError};
use spendwise::models::Category;

use super::open;

pub fn add(user: Option<&str>, pattern: &str, category: &str, match_type: &str, priority: i64) -> Result<()> {
    let ctx = open(user)?;
    let category: Category = category.parse()?;
    let match_type = MatchType::parse(match_type).ok_or_else(|| {
        SpendError::Validation(format!(
            "Invalid match type '{match_type}'. Must be one of: contains, starts_with, regex"
        ))
    })?;
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(SpendError::Validation("Rule pattern cannot be empty".to_string()));
    }
    let id = ctx.store.add_rule(&ctx.user_id, pattern, match_type, category, priority)?;
    println!("Added rule {id}: '{pattern}' \u{2192} {category}");
    Ok(())
}

pub fn list(user: Option<&str>) -> Result<()> {
    let ctx = open(user)?;
    let rules = ctx.store.list_rules(&ctx.user_id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Type", "Category", "Priority", "Hits"]);
    for stored in rules {
        let rule = stored.rule;
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(rule.pattern),
            Cell::new(rule.match_type.as_str()),
            Cell::new(rule.category),
            Cell::new(rule.priority),
            Cell::new(stored.hit_count),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(user: Option<&str>, id: i64) -> Result<()> {
    let ctx = open(user)?;
    let stored = ctx.store.deactivate_rule(&ctx.user_id, id)?;
    println!(
        "Deleted rule {id}: '{}' \u{2192} {}",
        stored.rule.pattern, stored.rule.category
    );
    Ok(())
}
