use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};

use spendwise::error::{Result, SpendError};
use spendwise::extractor::JsonExtractor;
use spendwise::fmt::money;
use spendwise::models::{ProcessingStatus, Receipt, ReceiptStatus};
use spendwise::processor::{ProcessOutcome, Processor};
use spendwise::receipts::{attach_ocr, extraction_input, upload as store_upload, upload_metadata};

use super::{open, short_id, Context};

pub fn upload(user: Option<&str>, files: &[PathBuf], ocr: Option<&Path>, no_process: bool) -> Result<()> {
    if ocr.is_some() && files.len() != 1 {
        return Err(SpendError::Validation(
            "--ocr applies to a single receipt file".to_string(),
        ));
    }
    let ctx = open(user)?;

    let mut failed = 0;
    for file in files {
        let result = store_upload(&ctx.store, &ctx.settings.data_path(), &ctx.user_id, file)
            .and_then(|receipt| {
                if let Some(ocr) = ocr {
                    attach_ocr(&receipt, ocr)?;
                }
                println!("Uploaded {} as {}", receipt.filename, short_id(&receipt.receipt_id));
                if no_process {
                    return Ok(());
                }
                let outcome = process(&ctx, &receipt)?;
                print_outcome(&outcome);
                Ok(())
            });
        if let Err(e) = result {
            eprintln!("{}: {e}", file.display());
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(SpendError::Other(format!(
            "{failed} of {} receipt(s) could not be uploaded",
            files.len()
        )));
    }
    Ok(())
}

pub fn reprocess(user: Option<&str>, id: &str, ocr: Option<&Path>) -> Result<()> {
    let ctx = open(user)?;
    let receipt_id = ctx.store.resolve_receipt_id(&ctx.user_id, id)?;
    let receipt = ctx.store.get_receipt(&ctx.user_id, &receipt_id)?;
    if let Some(ocr) = ocr {
        attach_ocr(&receipt, ocr)?;
    }
    let outcome = process(&ctx, &receipt)?;
    print_outcome(&outcome);
    Ok(())
}

fn process(ctx: &Context, receipt: &Receipt) -> Result<ProcessOutcome> {
    let classifier = ctx.classifier()?;
    let extractor = JsonExtractor;
    let processor = Processor::new(&ctx.store, &extractor, &classifier, &ctx.settings.reconciler);
    let input = extraction_input(receipt)?;
    processor.process(&upload_metadata(receipt), &input)
}

fn print_outcome(outcome: &ProcessOutcome) {
    match (&outcome.record, &outcome.classification) {
        (Some(record), Some(classification)) => {
            let status = match outcome.status {
                ProcessingStatus::NeedsReview => "needs review".yellow().to_string(),
                other => other.to_string().green().to_string(),
            };
            println!(
                "  {} {} on {} \u{2192} {} ({}, {}%) [{status}]",
                record.merchant,
                money(record.amount),
                record.date,
                record.category,
                classification.method.label(),
                classification.confidence,
            );
        }
        _ => {
            let reason = outcome.failure.as_deref().unwrap_or("unknown error");
            println!("  {} {reason}", "failed:".red());
        }
    }
    for reason in &outcome.reasons {
        println!("    - {reason}");
    }
}

pub fn list(user: Option<&str>, status: Option<&str>) -> Result<()> {
    let ctx = open(user)?;
    let status = status.map(str::parse::<ReceiptStatus>).transpose()?;
    let receipts = ctx.store.list_receipts(&ctx.user_id, status)?;

    if receipts.is_empty() {
        println!("No receipts.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Status", "Uploaded", "Expense"]);
    for r in &receipts {
        table.add_row(vec![
            Cell::new(short_id(&r.receipt_id)),
            Cell::new(&r.filename),
            Cell::new(r.status),
            Cell::new(r.uploaded_at.format("%Y-%m-%d %H:%M")),
            Cell::new(r.expense_id.as_deref().map(short_id).unwrap_or("")),
        ]);
    }
    println!("Receipts\n{table}");
    Ok(())
}

pub fn show(user: Option<&str>, id: &str) -> Result<()> {
    let ctx = open(user)?;
    let receipt_id = ctx.store.resolve_receipt_id(&ctx.user_id, id)?;
    let r = ctx.store.get_receipt(&ctx.user_id, &receipt_id)?;

    println!("Receipt:    {}", r.receipt_id);
    println!("File:       {}", r.filename);
    println!("Stored at:  {}", r.stored_path);
    println!("Checksum:   {}", r.checksum);
    println!("Status:     {}", r.status);
    println!("Uploaded:   {}", r.uploaded_at.to_rfc3339());
    if let Some(at) = r.processed_at {
        println!("Processed:  {}", at.to_rfc3339());
    }
    if let Some(expense_id) = &r.expense_id {
        println!("Expense:    {expense_id}");
    }
    if let Some(error) = &r.error_message {
        println!("Error:      {error}");
    }
    Ok(())
}
