use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{ExtractionFailure, ExtractionResult, LineItem, Suggestion};

/// OCR collaborator: turns receipt bytes into a raw field bag.
pub trait Extractor {
    fn extract(&self, image: &[u8]) -> Result<ExtractionResult, ExtractionFailure>;
}

/// Reads an OCR service response captured as JSON.
///
/// `{"error": "..."}` or input that is not a JSON object is a hard failure.
/// Anything else becomes an `ExtractionResult`: fields that are missing or
/// cannot be read are left empty, and reconciliation decides what that costs.
#[derive(Debug, Clone, Default)]
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn extract(&self, image: &[u8]) -> Result<ExtractionResult, ExtractionFailure> {
        if image.iter().all(u8::is_ascii_whitespace) {
            return Err(ExtractionFailure::new("empty document"));
        }
        let doc: Value = serde_json::from_slice(image)
            .map_err(|e| ExtractionFailure::new(format!("unreadable OCR output: {e}")))?;
        let Value::Object(fields) = doc else {
            return Err(ExtractionFailure::new("unreadable OCR output: expected a JSON object"));
        };
        if let Some(error) = fields.get("error") {
            return Err(ExtractionFailure::new(match error {
                Value::String(reason) => reason.clone(),
                other => other.to_string(),
            }));
        }
        Ok(read_fields(&fields))
    }
}

fn read_fields(fields: &Map<String, Value>) -> ExtractionResult {
    ExtractionResult {
        merchant: text(fields, "merchant"),
        total: amount(fields, "total"),
        subtotal: amount(fields, "subtotal"),
        tax: amount(fields, "tax"),
        date: text(fields, "date"),
        line_items: line_items(fields),
        confidence: confidences(fields),
        raw_text: text(fields, "raw_text"),
        category_hint: fields
            .get("category_hint")
            .filter(|v| !v.is_null())
            .and_then(|v| match serde_json::from_value::<Suggestion>(v.clone()) {
                Ok(hint) => Some(hint),
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable category_hint");
                    None
                }
            }),
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => {
            warn!(field = key, value = %other, "ignoring non-text OCR field");
            None
        }
    }
}

fn amount(fields: &Map<String, Value>, key: &str) -> Option<Decimal> {
    let value = fields.get(key)?;
    let parsed = parse_decimal(value);
    if parsed.is_none() && !value.is_null() {
        warn!(field = key, %value, "ignoring unreadable OCR amount");
    }
    parsed
}

/// Numbers as-is; strings may carry a currency symbol and thousands separators.
fn parse_decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', ""),
        _ => return None,
    };
    raw.trim()
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .ok()
}

fn line_items(fields: &Map<String, Value>) -> Vec<LineItem> {
    let Some(Value::Array(items)) = fields.get("line_items") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let item = item.as_object()?;
            let description = item.get("description")?.as_str()?.to_string();
            let number = |key: &str| item.get(key).and_then(parse_decimal);
            Some(LineItem {
                description,
                quantity: number("quantity"),
                unit_price: number("unit_price"),
                amount: number("amount"),
            })
        })
        .collect()
}

fn confidences(fields: &Map<String, Value>) -> BTreeMap<String, f64> {
    let Some(Value::Object(scores)) = fields.get("confidence") else {
        return BTreeMap::new();
    };
    scores
        .iter()
        .filter_map(|(field, score)| {
            let score = match score {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
                _ => None,
            }?;
            Some((field.clone(), score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_extracts_fields() {
        let doc = br#"{
            "merchant": "WALMART #123",
            "total": 45.67,
            "date": "2024-01-15",
            "line_items": [{"description": "Bananas", "quantity": 2, "unit_price": 1.50, "amount": 3.00}],
            "confidence": {"merchant": 95, "total": 95, "date": 95}
        }"#;
        let result = JsonExtractor.extract(doc).unwrap();
        assert_eq!(result.merchant.as_deref(), Some("WALMART #123"));
        assert_eq!(result.total, Some(dec!(45.67)));
        assert_eq!(result.line_items[0].quantity, Some(dec!(2)));
        assert_eq!(result.confidence["total"], 95.0);
    }

    #[test]
    fn test_error_document_is_failure() {
        let err = JsonExtractor.extract(br#"{"error": "image too blurry"}"#).unwrap_err();
        assert_eq!(err.reason, "image too blurry");
    }

    #[test]
    fn test_garbage_is_failure() {
        assert!(JsonExtractor.extract(b"\x89PNG\r\n").is_err());
        assert!(JsonExtractor.extract(b"  ").is_err());
    }

    #[test]
    fn test_badly_typed_fields_are_dropped_not_fatal() {
        let doc = br#"{
            "merchant": "Kroger",
            "total": "$1,012.00",
            "tax": "n/a",
            "date": 20240115,
            "line_items": [{"description": "Milk", "amount": "$3.49"}, {"amount": 2}, "junk"],
            "confidence": {"merchant": "96", "total": 94, "date": "high"},
            "category_hint": "groceries"
        }"#;
        let result = JsonExtractor.extract(doc).unwrap();
        assert_eq!(result.merchant.as_deref(), Some("Kroger"));
        assert_eq!(result.total, Some(dec!(1012.00)));
        assert_eq!(result.tax, None);
        assert_eq!(result.date, None);
        assert_eq!(result.line_items.len(), 1);
        assert_eq!(result.line_items[0].amount, Some(dec!(3.49)));
        assert_eq!(result.confidence["merchant"], 96.0);
        assert_eq!(result.confidence["total"], 94.0);
        assert!(!result.confidence.contains_key("date"));
        assert_eq!(result.category_hint, None);
    }

    #[test]
    fn test_non_object_json_is_failure() {
        assert!(JsonExtractor.extract(b"[1, 2, 3]").is_err());
        assert!(JsonExtractor.extract(b"42").is_err());
    }

    #[test]
    fn test_empty_object_is_empty_result() {
        let result = JsonExtractor.extract(b"{}").unwrap();
        assert_eq!(result, ExtractionResult::default());
    }
}
