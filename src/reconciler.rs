use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    Category, ExpenseRecord, ExtractionFailure, ExtractionResult, LineItem, ProcessingStatus,
    UploadMetadata,
};

pub const UNKNOWN_MERCHANT: &str = "Unknown";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y", "%d.%m.%Y"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Records scoring below this go to review.
    pub review_threshold: u8,
    /// Subtracted from the confidence score when the merchant is defaulted.
    pub merchant_penalty: u8,
    /// Score used when the extractor supplied no confidences at all.
    pub default_confidence: u8,
    /// Totals above this are kept but sent to review.
    pub large_amount: Decimal,
    /// Allowed gap, in percent, between the total and subtotal + tax.
    pub mismatch_tolerance_pct: Decimal,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            review_threshold: 70,
            merchant_penalty: 20,
            default_confidence: 50,
            large_amount: Decimal::new(99_999_999, 2),
            mismatch_tolerance_pct: Decimal::from(10),
        }
    }
}

/// Why a reconciled record was downgraded or annotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewReason {
    MissingTotal,
    InvalidTotal(Decimal),
    DefaultedMerchant,
    UnusualAmount(Decimal),
    LowConfidence(u8),
    MissingDate,
    InvalidDate(String),
    FutureDate(NaiveDate),
    AmountMismatch { total: Decimal, expected: Decimal },
}

impl ReviewReason {
    /// Date and mismatch notes are informational; the rest send the record to review.
    pub fn forces_review(&self) -> bool {
        matches!(
            self,
            Self::MissingTotal
                | Self::InvalidTotal(_)
                | Self::DefaultedMerchant
                | Self::UnusualAmount(_)
                | Self::LowConfidence(_)
        )
    }
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTotal => write!(f, "total not found"),
            Self::InvalidTotal(v) => write!(f, "negative total {v} replaced with 0"),
            Self::DefaultedMerchant => write!(f, "merchant not found"),
            Self::UnusualAmount(v) => write!(f, "unusually large amount {v}"),
            Self::LowConfidence(c) => write!(f, "low extraction confidence ({c})"),
            Self::MissingDate => write!(f, "date not found, using upload date"),
            Self::InvalidDate(raw) => write!(f, "unreadable date '{raw}', using upload date"),
            Self::FutureDate(d) => write!(f, "future date {d} replaced with upload date"),
            Self::AmountMismatch { total, expected } => {
                write!(f, "total {total} does not match subtotal + tax {expected}")
            }
        }
    }
}

/// Outcome of one reconciliation. `record` is `None` exactly when `status` is `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub record: Option<ExpenseRecord>,
    pub status: ProcessingStatus,
    pub reasons: Vec<ReviewReason>,
    pub failure: Option<String>,
}

/// Stable expense id for a receipt, so reprocessing overwrites instead of duplicating.
pub fn expense_id_for(user_id: &str, receipt_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{user_id}/{receipt_id}").as_bytes()).to_string()
}

pub fn reconcile(
    extraction: &Result<ExtractionResult, ExtractionFailure>,
    meta: &UploadMetadata,
    config: &ReconcilerConfig,
) -> Reconciliation {
    let extracted = match extraction {
        Ok(extracted) => extracted,
        Err(failure) => {
            warn!(receipt = %meta.receipt_id, reason = %failure.reason, "extraction failed");
            return Reconciliation {
                record: None,
                status: ProcessingStatus::Failed,
                reasons: Vec::new(),
                failure: Some(failure.reason.clone()),
            };
        }
    };

    let mut reasons = Vec::new();
    let upload_date = meta.uploaded_at.date_naive();

    let amount = match extracted.total {
        None => {
            reasons.push(ReviewReason::MissingTotal);
            Decimal::ZERO
        }
        Some(total) if total < Decimal::ZERO => {
            reasons.push(ReviewReason::InvalidTotal(total));
            Decimal::ZERO
        }
        Some(total) => {
            if total > config.large_amount {
                reasons.push(ReviewReason::UnusualAmount(total));
            }
            total
        }
    };

    let merchant = clean_merchant(extracted.merchant.as_deref());
    let merchant_defaulted = merchant.is_none();
    if merchant_defaulted {
        reasons.push(ReviewReason::DefaultedMerchant);
    }
    let merchant = merchant.unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());

    let date = match extracted.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            reasons.push(ReviewReason::MissingDate);
            upload_date
        }
        Some(raw) => match parse_receipt_date(raw) {
            None => {
                reasons.push(ReviewReason::InvalidDate(raw.to_string()));
                upload_date
            }
            Some(d) if d > upload_date => {
                reasons.push(ReviewReason::FutureDate(d));
                upload_date
            }
            Some(d) => {
                if upload_date.year() - d.year() > 10 {
                    warn!(receipt = %meta.receipt_id, date = %d, "receipt date is more than ten years old");
                }
                d
            }
        },
    };

    let tax = match extracted.tax {
        Some(t) if t < Decimal::ZERO => {
            debug!(receipt = %meta.receipt_id, tax = %t, "discarding negative tax");
            None
        }
        other => other,
    };

    let line_items = clean_line_items(&extracted.line_items);

    if let Some(total) = extracted.total.filter(|_| amount > Decimal::ZERO) {
        if let Some(expected) = expected_total(extracted.subtotal, &line_items, tax) {
            if mismatch_exceeds(total, expected, config.mismatch_tolerance_pct) {
                warn!(receipt = %meta.receipt_id, %total, %expected, "total does not match subtotal + tax");
                reasons.push(ReviewReason::AmountMismatch { total, expected });
            }
        }
    }

    let mut confidence = field_confidence(extracted, config.default_confidence);
    if merchant_defaulted {
        confidence = confidence.saturating_sub(config.merchant_penalty);
    }
    if confidence < config.review_threshold {
        reasons.push(ReviewReason::LowConfidence(confidence));
    }

    let needs_review = reasons.iter().any(ReviewReason::forces_review);
    let status = if needs_review {
        ProcessingStatus::NeedsReview
    } else {
        ProcessingStatus::Processed
    };
    let flag_reason = needs_review.then(|| {
        reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    });

    debug!(
        receipt = %meta.receipt_id,
        %amount,
        confidence,
        status = %status,
        "reconciled extraction"
    );

    let record = ExpenseRecord {
        expense_id: expense_id_for(&meta.user_id, &meta.receipt_id),
        user_id: meta.user_id.clone(),
        receipt_id: Some(meta.receipt_id.clone()),
        amount,
        merchant,
        category: Category::Other,
        category_confidence: 0,
        date,
        line_items,
        tax,
        confidence,
        notes: None,
        is_flagged: needs_review,
        flag_reason,
    };

    Reconciliation {
        record: Some(record),
        status,
        reasons,
        failure: None,
    }
}

/// Trimmed merchant with internal whitespace collapsed; `None` when blank.
pub fn clean_merchant(raw: Option<&str>) -> Option<String> {
    let cleaned = raw?.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn parse_receipt_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn clean_line_items(items: &[LineItem]) -> Vec<LineItem> {
    items
        .iter()
        .filter_map(|item| {
            let description = item.description.trim();
            if description.is_empty() {
                return None;
            }
            let amount = item.amount.or_else(|| match (item.quantity, item.unit_price) {
                (Some(q), Some(p)) => Some((q * p).round_dp(2)),
                _ => None,
            });
            Some(LineItem {
                description: description.to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                amount,
            })
        })
        .collect()
}

fn expected_total(subtotal: Option<Decimal>, items: &[LineItem], tax: Option<Decimal>) -> Option<Decimal> {
    let tax = tax?;
    let base = subtotal.or_else(|| {
        let amounts: Option<Vec<Decimal>> = items.iter().map(|i| i.amount).collect();
        amounts.filter(|a| !a.is_empty()).map(|a| a.into_iter().sum())
    })?;
    Some(base + tax)
}

fn mismatch_exceeds(total: Decimal, expected: Decimal, tolerance_pct: Decimal) -> bool {
    if expected <= Decimal::ZERO {
        return false;
    }
    let gap = (total - expected).abs();
    gap * Decimal::ONE_HUNDRED > expected * tolerance_pct
}

/// Minimum of the supplied field confidences, clamped to 0-100.
fn field_confidence(extracted: &ExtractionResult, default: u8) -> u8 {
    extracted
        .confidence
        .values()
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 100.0).round())
        .fold(None, |min: Option<f64>, v| Some(min.map_or(v, |m| m.min(v))))
        .map(|v| v as u8)
        .unwrap_or(default)
}
