use std::path::PathBuf;

use spendwise::error::Result;
use spendwise::reports::export_csv;
use spendwise::store::{ExpenseFilter, Store};
use spendwise::summary::DateRange;

use super::{open, parse_date_opt, today};

pub fn csv(
    user: Option<&str>,
    from_date: Option<&str>,
    to_date: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let ctx = open(user)?;
    let end = parse_date_opt(to_date)?.unwrap_or_else(today);
    let range = match parse_date_opt(from_date)? {
        Some(start) => DateRange::new(start, end)?,
        None => DateRange::month_to_date(end),
    };

    let records = ctx
        .store
        .get_records(&ctx.user_id, &ExpenseFilter::between(range.start, range.end))?;
    let content = export_csv(&records)?;

    let path = output.unwrap_or_else(|| {
        ctx.settings
            .data_path()
            .join("exports")
            .join(format!("expenses-{}-{}.csv", range.start, range.end))
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    println!("Exported {} expenses to {}", records.len(), path.display());
    Ok(())
}
