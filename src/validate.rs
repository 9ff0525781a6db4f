//! Input validation for manual edits and CLI arguments.

use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Result, SpendError};

pub const MAX_AMOUNT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);
pub const MAX_MERCHANT_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 1000;
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf"];

fn invalid(msg: impl Into<String>) -> SpendError {
    SpendError::Validation(msg.into())
}

pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(invalid("Amount must be greater than 0"));
    }
    if amount > MAX_AMOUNT {
        return Err(invalid("Amount is too large"));
    }
    if amount.normalize().scale() > 2 {
        return Err(invalid("Amount can have at most 2 decimal places"));
    }
    Ok(amount)
}

pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let amount: Decimal = raw
        .trim()
        .trim_start_matches('$')
        .replace(',', "")
        .parse()
        .map_err(|_| invalid("Invalid amount format"))?;
    validate_amount(amount)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| invalid("Invalid date format. Use YYYY-MM-DD"))
}

/// Trim and enforce a maximum length.
pub fn sanitize(value: &str, field: &str, max_len: usize) -> Result<String> {
    let value = value.trim();
    if value.chars().count() > max_len {
        return Err(invalid(format!("{field} exceeds maximum length of {max_len}")));
    }
    Ok(value.to_string())
}

pub fn validate_merchant(raw: &str) -> Result<String> {
    let merchant = sanitize(raw, "Merchant", MAX_MERCHANT_LEN)?;
    if merchant.is_empty() {
        return Err(invalid("Merchant is required"));
    }
    Ok(merchant)
}

pub fn validate_notes(raw: &str) -> Result<String> {
    sanitize(raw, "Notes", MAX_NOTES_LEN)
}

pub fn validate_threshold(threshold: i64) -> Result<u8> {
    if !(0..=100).contains(&threshold) {
        return Err(invalid("Threshold must be between 0 and 100"));
    }
    Ok(threshold as u8)
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    })
}

/// Returns the address trimmed and lowercased.
pub fn validate_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(invalid("Email is required"));
    }
    if !email_regex().is_match(&email) {
        return Err(invalid("Invalid email format"));
    }
    Ok(email)
}

/// Lowercased extension of an accepted receipt file.
pub fn validate_receipt_file(path: &Path, size: u64) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(invalid(format!(
            "Invalid file extension. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if size == 0 {
        return Err(invalid("File is empty"));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(invalid("File size exceeds 5MB limit"));
    }
    Ok(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_bounds() {
        assert!(validate_amount(dec!(0.01)).is_ok());
        assert!(validate_amount(dec!(999999.99)).is_ok());
        assert!(validate_amount(dec!(0)).is_err());
        assert!(validate_amount(dec!(-3)).is_err());
        assert!(validate_amount(dec!(1000000)).is_err());
    }

    #[test]
    fn test_amount_precision() {
        assert!(validate_amount(dec!(1.999)).is_err());
        assert!(validate_amount(dec!(1.500)).is_ok());
    }

    #[test]
    fn test_parse_amount_accepts_currency_formatting() {
        assert_eq!(parse_amount("$1,234.50").unwrap(), dec!(1234.50));
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-15").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(parse_date("01/15/2024").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn test_merchant_and_notes_lengths() {
        assert_eq!(validate_merchant("  Kroger ").unwrap(), "Kroger");
        assert!(validate_merchant("   ").is_err());
        assert!(validate_merchant(&"x".repeat(201)).is_err());
        assert!(validate_notes(&"x".repeat(1000)).is_ok());
        assert!(validate_notes(&"x".repeat(1001)).is_err());
    }

    #[test]
    fn test_threshold_range() {
        assert_eq!(validate_threshold(90).unwrap(), 90);
        assert!(validate_threshold(-1).is_err());
        assert!(validate_threshold(101).is_err());
    }

    #[test]
    fn test_email() {
        assert_eq!(validate_email(" Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_receipt_file() {
        assert_eq!(validate_receipt_file(Path::new("a.JPG"), 10).unwrap(), "jpg");
        assert!(validate_receipt_file(Path::new("a.gif"), 10).is_err());
        assert!(validate_receipt_file(Path::new("a.png"), 0).is_err());
        assert!(validate_receipt_file(Path::new("a.pdf"), MAX_UPLOAD_BYTES + 1).is_err());
    }
}
