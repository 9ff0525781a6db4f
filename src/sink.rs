use std::path::PathBuf;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::validate::validate_email;

pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

pub struct ReportPayload {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Delivery collaborator for rendered reports and alerts.
pub trait ReportSink {
    /// Returns the message id assigned to the delivery.
    fn deliver(&self, payload: &ReportPayload, recipient: &str) -> Result<String>;
}

/// Writes each message into a local outbox directory instead of sending it.
///
/// Layout: `<dir>/<message_id>/message.txt` plus one file per attachment.
pub struct OutboxSink {
    dir: PathBuf,
}

impl OutboxSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for OutboxSink {
    fn deliver(&self, payload: &ReportPayload, recipient: &str) -> Result<String> {
        let recipient = validate_email(recipient)?;
        let message_id = Uuid::new_v4().to_string();
        let message_dir = self.dir.join(&message_id);
        std::fs::create_dir_all(&message_dir)?;

        let mut message = format!(
            "To: {recipient}\nSubject: {}\nDate: {}\nMessage-Id: <{message_id}@spendwise>\n",
            payload.subject,
            Utc::now().to_rfc2822()
        );
        for attachment in &payload.attachments {
            message.push_str(&format!("Attachment: {}\n", attachment.filename));
            std::fs::write(message_dir.join(&attachment.filename), &attachment.content)?;
        }
        message.push('\n');
        message.push_str(&payload.body);
        std::fs::write(message_dir.join("message.txt"), message)?;

        info!(%message_id, %recipient, subject = %payload.subject, "report queued in outbox");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ReportPayload {
        ReportPayload {
            subject: "Weekly report".to_string(),
            body: "Total: $10.00".to_string(),
            attachments: vec![Attachment {
                filename: "expenses.csv".to_string(),
                content: b"Date,Merchant\n".to_vec(),
            }],
        }
    }

    #[test]
    fn test_outbox_writes_message_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutboxSink::new(dir.path());
        let id = sink.deliver(&payload(), "Alice@Example.com").unwrap();
        let message = std::fs::read_to_string(dir.path().join(&id).join("message.txt")).unwrap();
        assert!(message.starts_with("To: alice@example.com\nSubject: Weekly report"));
        assert!(message.ends_with("Total: $10.00"));
        assert!(dir.path().join(&id).join("expenses.csv").exists());
    }

    #[test]
    fn test_outbox_rejects_bad_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutboxSink::new(dir.path());
        assert!(sink.deliver(&payload(), "not-an-email").is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutboxSink::new(dir.path());
        let a = sink.deliver(&payload(), "a@example.com").unwrap();
        let b = sink.deliver(&payload(), "a@example.com").unwrap();
        assert_ne!(a, b);
    }
}
