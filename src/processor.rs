//! Receipt processing pipeline: extract, reconcile, classify, store.
//!
//! Every call ends with the receipt in a terminal status. A store error while
//! writing the expense marks the receipt `failed` before the error is returned,
//! and a `failed` receipt never keeps an expense.

use tracing::{info, warn};

use crate::categorizer::{Classification, ClassificationMethod, Classifier, EntityCategorizer};
use crate::error::Result;
use crate::extractor::Extractor;
use crate::models::{
    ExpenseRecord, ExtractionResult, ProcessingStatus, ReceiptStatus, ReceiptUpdate, UploadMetadata,
};
use crate::reconciler::{reconcile, ReconcilerConfig, ReviewReason};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub status: ProcessingStatus,
    pub record: Option<ExpenseRecord>,
    pub classification: Option<Classification>,
    pub reasons: Vec<ReviewReason>,
    pub failure: Option<String>,
}

pub struct Processor<'a> {
    store: &'a dyn Store,
    extractor: &'a dyn Extractor,
    classifier: &'a Classifier,
    reconciler: &'a ReconcilerConfig,
    categorizer: Option<&'a dyn EntityCategorizer>,
}

impl<'a> Processor<'a> {
    pub fn new(
        store: &'a dyn Store,
        extractor: &'a dyn Extractor,
        classifier: &'a Classifier,
        reconciler: &'a ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            classifier,
            reconciler,
            categorizer: None,
        }
    }

    /// Entity categorizer consulted when no rule matches. Takes precedence over
    /// a suggestion carried inside the extraction.
    pub fn with_categorizer(mut self, categorizer: &'a dyn EntityCategorizer) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    pub fn process(&self, meta: &UploadMetadata, image: &[u8]) -> Result<ProcessOutcome> {
        self.store.set_receipt_status(
            &meta.user_id,
            &meta.receipt_id,
            &ReceiptUpdate::status(ReceiptStatus::Processing),
        )?;
        match self.run(meta, image) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let failed = ReceiptUpdate {
                    status: ReceiptStatus::Failed,
                    expense_id: None,
                    error_message: Some(e.to_string()),
                };
                if let Err(mark_err) = self.store.set_receipt_status(&meta.user_id, &meta.receipt_id, &failed) {
                    warn!(receipt = %meta.receipt_id, error = %mark_err, "could not mark receipt failed");
                }
                Err(e)
            }
        }
    }

    fn run(&self, meta: &UploadMetadata, image: &[u8]) -> Result<ProcessOutcome> {
        let extraction = self.extractor.extract(image);
        let reconciliation = reconcile(&extraction, meta, self.reconciler);

        let Some(mut record) = reconciliation.record else {
            let failed = ReceiptUpdate {
                status: ReceiptStatus::Failed,
                expense_id: None,
                error_message: reconciliation.failure.clone(),
            };
            self.store.set_receipt_status(&meta.user_id, &meta.receipt_id, &failed)?;
            return Ok(ProcessOutcome {
                status: ProcessingStatus::Failed,
                record: None,
                classification: None,
                reasons: reconciliation.reasons,
                failure: reconciliation.failure,
            });
        };

        let extracted = extraction.as_ref().ok();
        let hint = extracted.and_then(text_hint);
        let upstream = extracted.and_then(|e| e.category_hint);
        let entity: Option<&dyn EntityCategorizer> = match self.categorizer {
            Some(categorizer) => Some(categorizer),
            None => upstream.as_ref().map(|s| s as &dyn EntityCategorizer),
        };
        let merchant = if reconciliation.reasons.contains(&ReviewReason::DefaultedMerchant) {
            ""
        } else {
            record.merchant.as_str()
        };
        let classification = self.classifier.classify(merchant, hint.as_deref(), entity);
        record.category = classification.category;
        record.category_confidence = classification.confidence;

        self.store.put_record(&record)?;
        let done = ReceiptUpdate {
            status: reconciliation.status.into(),
            expense_id: Some(record.expense_id.clone()),
            error_message: None,
        };
        if let Err(e) = self.store.set_receipt_status(&meta.user_id, &meta.receipt_id, &done) {
            // A receipt that ends up failed must not leave an expense behind.
            if let Err(undo) = self.store.remove_record(&meta.user_id, &record.expense_id) {
                warn!(expense = %record.expense_id, error = %undo, "could not remove orphaned expense");
            }
            return Err(e);
        }
        if let ClassificationMethod::CustomRule(rule_id) = classification.method {
            if let Err(e) = self.store.record_rule_hit(rule_id) {
                warn!(rule = rule_id, error = %e, "could not count rule hit");
            }
        }

        info!(
            receipt = %meta.receipt_id,
            expense = %record.expense_id,
            category = %record.category,
            method = classification.method.label(),
            status = %reconciliation.status,
            "receipt processed"
        );

        Ok(ProcessOutcome {
            status: reconciliation.status,
            record: Some(record),
            classification: Some(classification),
            reasons: reconciliation.reasons,
            failure: None,
        })
    }
}

/// Line-item descriptions followed by the raw OCR text.
fn text_hint(extracted: &ExtractionResult) -> Option<String> {
    let mut parts: Vec<&str> = extracted
        .line_items
        .iter()
        .map(|i| i.description.trim())
        .filter(|d| !d.is_empty())
        .collect();
    if let Some(raw) = extracted.raw_text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        parts.push(raw);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}
