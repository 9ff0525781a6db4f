use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::db::SqliteStore;
use crate::error::{Result, SpendError};
use crate::models::{Receipt, ReceiptStatus, UploadMetadata};
use crate::validate::validate_receipt_file;

fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

pub fn receipts_dir(data_dir: &Path, user_id: &str) -> PathBuf {
    data_dir.join("receipts").join(user_id)
}

/// Validate a receipt file, copy it under the data directory and register it
/// as `pending`. The same file content can only be uploaded once per user.
pub fn upload(store: &SqliteStore, data_dir: &Path, user_id: &str, source: &Path) -> Result<Receipt> {
    let size = std::fs::metadata(source)?.len();
    let ext = validate_receipt_file(source, size)?;
    let content = std::fs::read(source)?;
    let checksum = compute_checksum(&content);

    if let Some(existing) = store.find_receipt_by_checksum(user_id, &checksum)? {
        return Err(SpendError::Duplicate(format!(
            "receipt {} has the same content",
            existing.receipt_id
        )));
    }

    let receipt_id = Uuid::new_v4().to_string();
    let dir = receipts_dir(data_dir, user_id);
    std::fs::create_dir_all(&dir)?;
    let stored_path = dir.join(format!("{receipt_id}.{ext}"));
    std::fs::write(&stored_path, &content)?;

    let receipt = Receipt {
        user_id: user_id.to_string(),
        receipt_id,
        filename: source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string(),
        stored_path: stored_path.to_string_lossy().to_string(),
        checksum,
        status: ReceiptStatus::Pending,
        expense_id: None,
        error_message: None,
        uploaded_at: Utc::now(),
        processed_at: None,
    };
    if let Err(e) = store.insert_receipt(&receipt) {
        let _ = std::fs::remove_file(&stored_path);
        return Err(e);
    }
    info!(receipt = %receipt.receipt_id, user = %user_id, file = %receipt.filename, "receipt uploaded");
    Ok(receipt)
}

pub fn upload_metadata(receipt: &Receipt) -> UploadMetadata {
    UploadMetadata {
        user_id: receipt.user_id.clone(),
        receipt_id: receipt.receipt_id.clone(),
        uploaded_at: receipt.uploaded_at,
    }
}

/// Stored bytes of a receipt.
pub fn load_image(receipt: &Receipt) -> Result<Vec<u8>> {
    Ok(std::fs::read(&receipt.stored_path)?)
}

/// Where OCR output for a receipt is kept, next to the stored image.
pub fn ocr_path(receipt: &Receipt) -> PathBuf {
    PathBuf::from(format!("{}.ocr.json", receipt.stored_path))
}

/// Store OCR output for a receipt, replacing any earlier output.
pub fn attach_ocr(receipt: &Receipt, source: &Path) -> Result<PathBuf> {
    let content = std::fs::read(source)?;
    serde_json::from_slice::<serde_json::Value>(&content)?;
    let path = ocr_path(receipt);
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Input handed to the extractor: the OCR output when present, otherwise the
/// stored image bytes.
pub fn extraction_input(receipt: &Receipt) -> Result<Vec<u8>> {
    let ocr = ocr_path(receipt);
    if ocr.exists() {
        return Ok(std::fs::read(ocr)?);
    }
    load_image(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_store;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_upload_copies_and_registers() {
        let (dir, store) = test_store();
        let source = write_file(dir.path(), "lunch.JPG", b"fake image");
        let receipt = upload(&store, dir.path(), "alice", &source).unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Pending);
        assert_eq!(receipt.filename, "lunch.JPG");
        assert!(receipt.stored_path.ends_with(&format!("{}.jpg", receipt.receipt_id)));
        assert_eq!(load_image(&receipt).unwrap(), b"fake image");
        assert_eq!(store.get_receipt("alice", &receipt.receipt_id).unwrap(), receipt);
    }

    #[test]
    fn test_duplicate_upload_rejected_per_user() {
        let (dir, store) = test_store();
        let source = write_file(dir.path(), "a.png", b"same bytes");
        upload(&store, dir.path(), "alice", &source).unwrap();
        let err = upload(&store, dir.path(), "alice", &source).unwrap_err();
        assert!(matches!(err, SpendError::Duplicate(_)));
        assert!(upload(&store, dir.path(), "bob", &source).is_ok());
    }

    #[test]
    fn test_invalid_files_rejected() {
        let (dir, store) = test_store();
        let gif = write_file(dir.path(), "a.gif", b"GIF89a");
        assert!(matches!(
            upload(&store, dir.path(), "alice", &gif),
            Err(SpendError::Validation(_))
        ));
        let empty = write_file(dir.path(), "a.pdf", b"");
        assert!(upload(&store, dir.path(), "alice", &empty).is_err());
        assert!(upload(&store, dir.path(), "alice", &dir.path().join("missing.jpg")).is_err());
    }

    #[test]
    fn test_extraction_input_prefers_ocr() {
        let (dir, store) = test_store();
        let source = write_file(dir.path(), "r.png", b"png bytes");
        let receipt = upload(&store, dir.path(), "alice", &source).unwrap();
        assert_eq!(extraction_input(&receipt).unwrap(), b"png bytes");

        let bad = write_file(dir.path(), "bad.json", b"not json");
        assert!(matches!(attach_ocr(&receipt, &bad), Err(SpendError::Json(_))));

        let ocr = write_file(dir.path(), "ocr.json", br#"{"merchant":"Kroger","total":"12.00"}"#);
        attach_ocr(&receipt, &ocr).unwrap();
        let input = extraction_input(&receipt).unwrap();
        assert!(input.starts_with(b"{"));
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            compute_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
