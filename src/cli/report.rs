use spendwise::error::{Result, SpendError};
use spendwise::reports::{export_csv, generate, render_text, report_payload, ReportKind};
use spendwise::sink::{OutboxSink, ReportSink};
use spendwise::store::{ExpenseFilter, Store};

use super::{open, short_id, today, ReportOpts};

pub fn run(user: Option<&str>, kind: ReportKind, opts: &ReportOpts) -> Result<()> {
    let ctx = open(user)?;
    let report = generate(&ctx.store, &ctx.user_id, kind, today(), &ctx.summary_options())?;

    print!("{}", render_text(&report));

    if let Some(path) = &opts.output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("\nSaved report to {}", path.display());
    }

    if opts.send {
        let recipient = opts
            .to
            .clone()
            .or_else(|| ctx.settings.report_recipient.clone())
            .ok_or_else(|| {
                SpendError::Settings("no recipient: pass --to or run `spendwise init --email`".to_string())
            })?;
        let records = ctx.store.get_records(
            &ctx.user_id,
            &ExpenseFilter::between(report.range.start, report.range.end),
        )?;
        let payload = report_payload(&report, export_csv(&records)?);
        let sink = OutboxSink::new(ctx.settings.data_path().join("outbox"));
        let message_id = sink.deliver(&payload, &recipient)?;
        println!("\nQueued \"{}\" for {recipient} ({})", payload.subject, short_id(&message_id));
    }
    Ok(())
}
