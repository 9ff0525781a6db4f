use spendwise::db::SqliteStore;
use spendwise::error::Result;
use spendwise::fmt::format_bytes;
use spendwise::models::ReceiptStatus;
use spendwise::settings::load_settings;

pub fn run(user: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();
    let user_id = user.unwrap_or(&settings.user_id);

    println!("User:       {user_id}");
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!(
        "Reports to: {}",
        settings.report_recipient.as_deref().unwrap_or("(not set)")
    );

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let store = SqliteStore::open(&db_path)?;
        let receipts = store.list_receipts(user_id, None)?;
        let pending = receipts
            .iter()
            .filter(|r| r.status == ReceiptStatus::Pending)
            .count();
        let failed = receipts
            .iter()
            .filter(|r| r.status == ReceiptStatus::Failed)
            .count();

        println!();
        println!("Receipts:      {}", receipts.len());
        println!("  pending:     {pending}");
        println!("  failed:      {failed}");
        println!("Expenses:      {}", store.count_expenses(user_id, false)?);
        println!("Flagged:       {}", store.count_expenses(user_id, true)?);
        println!("Budgets:       {}", store.list_budgets(user_id, true)?.len());
        println!("Rules:         {}", store.list_rules(user_id)?.len());
    } else {
        println!();
        println!("Database not found. Run `spendwise init` to set up.");
    }

    Ok(())
}
