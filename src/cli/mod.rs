pub mod budgets;
pub mod classify;
pub mod expenses;
pub mod export;
pub mod init;
pub mod receipts;
pub mod report;
pub mod review;
pub mod rules;
pub mod status;
pub mod summary;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use spendwise::categorizer::Classifier;
use spendwise::db::SqliteStore;
use spendwise::error::{Result, SpendError};
use spendwise::models::Category;
use spendwise::settings::{load_settings, Settings};
use spendwise::summary::{Granularity, SummaryOptions};
use spendwise::validate::parse_date;

/// Settings, resolved user and open store for one command.
pub(crate) struct Context {
    pub settings: Settings,
    pub user_id: String,
    pub store: SqliteStore,
}

pub(crate) fn open(user: Option<&str>) -> Result<Context> {
    let settings = load_settings();
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(SpendError::Other(
            "Database not found. Run `spendwise init` to set up.".to_string(),
        ));
    }
    let store = SqliteStore::open(&db_path)?;
    let user_id = user
        .map(str::to_string)
        .unwrap_or_else(|| settings.user_id.clone());
    Ok(Context {
        settings,
        user_id,
        store,
    })
}

impl Context {
    /// Classifier carrying this user's active rules.
    pub fn classifier(&self) -> Result<Classifier> {
        Ok(Classifier::new(self.settings.classifier.clone())
            .with_custom_rules(self.store.active_rules(&self.user_id)?))
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            top_merchants: self.settings.top_merchants,
            ..SummaryOptions::default()
        }
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub(crate) fn parse_category_opt(raw: Option<&str>) -> Result<Option<Category>> {
    raw.map(str::parse).transpose()
}

pub(crate) fn parse_date_opt(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(parse_date).transpose()
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[derive(Parser)]
#[command(
    name = "spendwise",
    version,
    about = "Turn receipt scans into categorized expenses, budgets and reports."
)]
pub struct Cli {
    /// Act as this user (default: user_id from settings)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up spendwise: choose a data directory and initialize the database.
    Init {
        /// Path for spendwise data
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Default recipient for reports and budget alerts
        #[arg(long)]
        email: Option<String>,
    },
    /// Show data location and record counts.
    Status,
    /// Upload and process receipts.
    Receipts {
        #[command(subcommand)]
        command: ReceiptsCommands,
    },
    /// Inspect and correct expenses.
    Expenses {
        #[command(subcommand)]
        command: ExpensesCommands,
    },
    /// Walk through expenses flagged for review.
    Review,
    /// Manage spending budgets.
    Budgets {
        #[command(subcommand)]
        command: BudgetsCommands,
    },
    /// Spending summary for a date range.
    Summary {
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD (default: today)
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Number of days ending at --to (default: summary_window_days)
        #[arg(long, conflicts_with = "from_date")]
        days: Option<u32>,
        /// Period bucket size
        #[arg(long = "by", value_enum, default_value = "month")]
        by: GranularityArg,
        /// How many merchants to rank (default: top_merchants)
        #[arg(long)]
        top: Option<usize>,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Weekly or monthly spending report.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export expenses.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Show how a merchant would be categorized.
    Classify {
        /// Merchant name as printed on the receipt
        merchant: String,
        /// Extra text, e.g. line items
        #[arg(long)]
        hint: Option<String>,
    },
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GranularityArg {
    Day,
    Week,
    Month,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Day => Granularity::Day,
            GranularityArg::Week => Granularity::Week,
            GranularityArg::Month => Granularity::Month,
        }
    }
}

#[derive(Subcommand)]
pub enum ReceiptsCommands {
    /// Upload receipt images (jpg, jpeg, png, pdf; max 5MB) and process them.
    Upload {
        /// Receipt files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// OCR output for the receipt as JSON (single file uploads only)
        #[arg(long)]
        ocr: Option<PathBuf>,
        /// Store the receipt without processing it
        #[arg(long = "no-process")]
        no_process: bool,
    },
    /// Run processing again for a stored receipt.
    Reprocess {
        /// Receipt ID (or unique prefix)
        id: String,
        /// Replace the stored OCR output
        #[arg(long)]
        ocr: Option<PathBuf>,
    },
    /// List receipts.
    List {
        /// Filter by status: pending, processing, processed, needs_review, failed
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one receipt.
    Show {
        /// Receipt ID (or unique prefix)
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ExpensesCommands {
    /// List expenses, newest first.
    List {
        #[arg(long)]
        category: Option<String>,
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Only expenses flagged for review
        #[arg(long)]
        flagged: bool,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Show one expense with its line items.
    Show {
        /// Expense ID (or unique prefix)
        id: String,
    },
    /// Correct an expense. Clears its review flag.
    Update {
        /// Expense ID (or unique prefix)
        id: String,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        merchant: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Date: YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Also add a rule sending this merchant to the chosen category
        #[arg(long)]
        remember: bool,
    },
    /// Delete an expense.
    Delete {
        /// Expense ID (or unique prefix)
        id: String,
    },
}

#[derive(Subcommand)]
pub enum BudgetsCommands {
    /// Create a budget.
    Add {
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: String,
        /// weekly or monthly
        #[arg(long)]
        period: String,
        /// Alert when this percentage is used (0-100)
        #[arg(long, default_value = "90")]
        threshold: i64,
    },
    /// List budgets with current spending.
    List {
        /// Include deactivated budgets
        #[arg(long)]
        all: bool,
    },
    /// Show one budget with current spending.
    Show {
        /// Budget ID (or unique prefix)
        id: String,
    },
    /// Change a budget.
    Update {
        /// Budget ID (or unique prefix)
        id: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        threshold: Option<i64>,
    },
    /// Deactivate a budget.
    Delete {
        /// Budget ID (or unique prefix)
        id: String,
    },
    /// Budgets at or above their alert threshold.
    Alerts {
        /// Deliver one alert per budget to the outbox
        #[arg(long)]
        send: bool,
        /// Recipient (default: report_recipient from settings)
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Last seven days.
    Weekly {
        #[command(flatten)]
        opts: ReportOpts,
    },
    /// Month to date.
    Monthly {
        #[command(flatten)]
        opts: ReportOpts,
    },
}

#[derive(clap::Args)]
pub struct ReportOpts {
    /// Deliver the report with a CSV attachment to the outbox
    #[arg(long)]
    pub send: bool,
    /// Recipient (default: report_recipient from settings)
    #[arg(long)]
    pub to: Option<String>,
    /// Also write the report as JSON to this path
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export expenses to CSV.
    Csv {
        /// Start date: YYYY-MM-DD (default: first of this month)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD (default: today)
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Output file path (default: <data_dir>/exports/expenses-<from>-<to>.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a categorization rule.
    Add {
        /// Pattern to match against merchant names
        pattern: String,
        /// Category name to assign
        #[arg(long)]
        category: String,
        /// Match type: contains, starts_with, regex
        #[arg(long = "match-type", default_value = "contains")]
        match_type: String,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
    },
    /// List active rules.
    List,
    /// Delete (deactivate) a rule by ID.
    Delete {
        /// Rule ID (shown in `spendwise rules list`)
        id: i64,
    },
}
