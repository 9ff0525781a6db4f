mod cli;

use clap::Parser;

use cli::{
    BudgetsCommands, Cli, Commands, ExpensesCommands, ExportCommands, ReceiptsCommands, ReportCommands,
    RulesCommands,
};
use spendwise::reports::ReportKind;

fn main() {
    spendwise::init_tracing();
    let cli = Cli::parse();
    let user = cli.user.as_deref();

    let result = match cli.command {
        Commands::Init { data_dir, email } => cli::init::run(data_dir, email, cli.user.clone()),
        Commands::Status => cli::status::run(user),
        Commands::Receipts { command } => match command {
            ReceiptsCommands::Upload {
                files,
                ocr,
                no_process,
            } => cli::receipts::upload(user, &files, ocr.as_deref(), no_process),
            ReceiptsCommands::Reprocess { id, ocr } => cli::receipts::reprocess(user, &id, ocr.as_deref()),
            ReceiptsCommands::List { status } => cli::receipts::list(user, status.as_deref()),
            ReceiptsCommands::Show { id } => cli::receipts::show(user, &id),
        },
        Commands::Expenses { command } => match command {
            ExpensesCommands::List {
                category,
                from_date,
                to_date,
                flagged,
                limit,
            } => cli::expenses::list(
                user,
                category.as_deref(),
                from_date.as_deref(),
                to_date.as_deref(),
                flagged,
                limit,
            ),
            ExpensesCommands::Show { id } => cli::expenses::show(user, &id),
            ExpensesCommands::Update {
                id,
                amount,
                merchant,
                category,
                date,
                notes,
                remember,
            } => cli::expenses::update(
                user,
                &id,
                amount.as_deref(),
                merchant,
                category.as_deref(),
                date.as_deref(),
                notes,
                remember,
            ),
            ExpensesCommands::Delete { id } => cli::expenses::delete(user, &id),
        },
        Commands::Review => cli::review::run(user),
        Commands::Budgets { command } => match command {
            BudgetsCommands::Add {
                category,
                amount,
                period,
                threshold,
            } => cli::budgets::add(user, &category, &amount, &period, threshold),
            BudgetsCommands::List { all } => cli::budgets::list(user, all),
            BudgetsCommands::Show { id } => cli::budgets::show(user, &id),
            BudgetsCommands::Update {
                id,
                category,
                amount,
                period,
                threshold,
            } => cli::budgets::update(
                user,
                &id,
                category.as_deref(),
                amount.as_deref(),
                period.as_deref(),
                threshold,
            ),
            BudgetsCommands::Delete { id } => cli::budgets::delete(user, &id),
            BudgetsCommands::Alerts { send, to } => cli::budgets::alerts(user, send, to.as_deref()),
        },
        Commands::Summary {
            from_date,
            to_date,
            days,
            by,
            top,
            json,
        } => cli::summary::run(
            user,
            from_date.as_deref(),
            to_date.as_deref(),
            days,
            by.into(),
            top,
            json,
        ),
        Commands::Report { command } => match command {
            ReportCommands::Weekly { opts } => cli::report::run(user, ReportKind::Weekly, &opts),
            ReportCommands::Monthly { opts } => cli::report::run(user, ReportKind::Monthly, &opts),
        },
        Commands::Export { command } => match command {
            ExportCommands::Csv {
                from_date,
                to_date,
                output,
            } => cli::export::csv(user, from_date.as_deref(), to_date.as_deref(), output),
        },
        Commands::Classify { merchant, hint } => cli::classify::run(user, &merchant, hint.as_deref()),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                category,
                match_type,
                priority,
            } => cli::rules::add(user, &pattern, &category, &match_type, priority),
            RulesCommands::List => cli::rules::list(user),
            RulesCommands::Delete { id } => cli::rules::delete(user, id),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
