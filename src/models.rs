use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SpendError;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Fixed spending categories. Declaration order is the display order used by
/// reports and the `Ord` used for deterministic map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Food & Dining")]
    FoodAndDining,
    #[serde(rename = "Transportation")]
    Transportation,
    #[serde(rename = "Shopping")]
    Shopping,
    #[serde(rename = "Entertainment")]
    Entertainment,
    #[serde(rename = "Utilities")]
    Utilities,
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[serde(rename = "Travel")]
    Travel,
    #[serde(rename = "Education")]
    Education,
    #[serde(rename = "Groceries")]
    Groceries,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::FoodAndDining,
        Category::Transportation,
        Category::Shopping,
        Category::Entertainment,
        Category::Utilities,
        Category::Healthcare,
        Category::Travel,
        Category::Education,
        Category::Groceries,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodAndDining => "Food & Dining",
            Self::Transportation => "Transportation",
            Self::Shopping => "Shopping",
            Self::Entertainment => "Entertainment",
            Self::Utilities => "Utilities",
            Self::Healthcare => "Healthcare",
            Self::Travel => "Travel",
            Self::Education => "Education",
            Self::Groceries => "Groceries",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SpendError;

    /// Accepts the display name case-insensitively, plus a couple of
    /// shell-friendly spellings (`food`, `food-and-dining`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        for cat in Category::ALL {
            if cat.as_str().to_lowercase() == wanted {
                return Ok(cat);
            }
        }
        match wanted.as_str() {
            "food" | "dining" | "food-and-dining" | "food_and_dining" => Ok(Category::FoodAndDining),
            _ => Err(SpendError::UnknownCategory(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction (OCR collaborator output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// Category suggestion from an entity categorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: Category,
    pub confidence: u8,
}

/// Raw field bag produced by the OCR collaborator. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub tax: Option<Decimal>,
    /// Date exactly as printed on the receipt.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    /// Per-field confidence, 0-100, keyed by field name.
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
    #[serde(default)]
    pub raw_text: Option<String>,
    /// Suggestion computed upstream by an entity categorizer, if any.
    #[serde(default)]
    pub category_hint: Option<Suggestion>,
}

/// Hard extraction failure (unreadable image, OCR service refused the input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub reason: String,
}

impl ExtractionFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extraction failed: {}", self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    pub user_id: String,
    pub receipt_id: String,
    pub uploaded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Processed,
    NeedsReview,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub expense_id: String,
    pub user_id: String,
    pub receipt_id: Option<String>,
    pub amount: Decimal,
    pub merchant: String,
    pub category: Category,
    pub category_confidence: u8,
    pub date: NaiveDate,
    pub line_items: Vec<LineItem>,
    pub tax: Option<Decimal>,
    pub confidence: u8,
    pub notes: Option<String>,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
}

/// Manual edit of a stored expense. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ExpenseUpdate {
    pub amount: Option<Decimal>,
    pub merchant: Option<String>,
    pub category: Option<Category>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.merchant.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.notes.is_none()
    }
}

// ---------------------------------------------------------------------------
// Budgets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetPeriod {
    type Err = SpendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(SpendError::Validation(format!(
                "Invalid period '{other}'. Must be one of: weekly, monthly"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub budget_id: String,
    pub user_id: String,
    pub category: Category,
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub alert_threshold: u8,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BudgetUpdate {
    pub category: Option<Category>,
    pub amount: Option<Decimal>,
    pub period: Option<BudgetPeriod>,
    pub alert_threshold: Option<u8>,
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Processing,
    Processed,
    NeedsReview,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptStatus {
    type Err = SpendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "needs_review" => Ok(Self::NeedsReview),
            "failed" => Ok(Self::Failed),
            other => Err(SpendError::Other(format!("unknown receipt status '{other}'"))),
        }
    }
}

impl From<ProcessingStatus> for ReceiptStatus {
    fn from(status: ProcessingStatus) -> Self {
        match status {
            ProcessingStatus::Processed => Self::Processed,
            ProcessingStatus::NeedsReview => Self::NeedsReview,
            ProcessingStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub user_id: String,
    pub receipt_id: String,
    pub filename: String,
    pub stored_path: String,
    pub checksum: String,
    pub status: ReceiptStatus,
    pub expense_id: Option<String>,
    pub error_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Status transition written back to the receipt row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptUpdate {
    pub status: ReceiptStatus,
    pub expense_id: Option<String>,
    pub error_message: Option<String>,
}

impl ReceiptUpdate {
    pub fn status(status: ReceiptStatus) -> Self {
        Self {
            status,
            expense_id: None,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_roundtrip() {
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
        }
        assert_eq!("groceries".parse::<Category>().unwrap(), Category::Groceries);
        assert_eq!("food".parse::<Category>().unwrap(), Category::FoodAndDining);
        assert!("Rent".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_display_name() {
        let json = serde_json::to_string(&Category::FoodAndDining).unwrap();
        assert_eq!(json, "\"Food & Dining\"");
    }

    #[test]
    fn test_extraction_result_tolerates_missing_fields() {
        let parsed: ExtractionResult = serde_json::from_str(r#"{"merchant": "Cafe"}"#).unwrap();
        assert_eq!(parsed.merchant.as_deref(), Some("Cafe"));
        assert!(parsed.total.is_none());
        assert!(parsed.line_items.is_empty());
        assert!(parsed.confidence.is_empty());
    }

    #[test]
    fn test_budget_period_parse() {
        assert_eq!("Weekly".parse::<BudgetPeriod>().unwrap(), BudgetPeriod::Weekly);
        let err = "daily".parse::<BudgetPeriod>().unwrap_err();
        assert!(err.to_string().contains("weekly, monthly"));
    }
}
