//! Directory spool transport.
//!
//! Each accepted message becomes one JSON file in the spool directory. An
//! external MTA picks files up and deletes them after relay.
//!
//! # Invariants
//! - Files appear atomically (written as `.tmp`, then renamed).
//! - File names sort by queue time, then by send order within one mailer.

use super::{MailError, Mailer, QuoteEmail};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// On-disk shape of one spooled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpooledMail {
    pub message_id: Uuid,
    pub recipient: String,
    pub queued_at_ms: u64,
    #[serde(flatten)]
    pub email: QuoteEmail,
}

/// Mailer that writes messages into a spool directory.
#[derive(Debug)]
pub struct SpoolMailer {
    dir: PathBuf,
    seq: AtomicU64,
}

impl SpoolMailer {
    /// Uses `dir` as the spool, creating it when missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, MailError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads back every spooled message, oldest first.
    pub fn list_spooled(&self) -> Result<Vec<SpooledMail>, MailError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut messages = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = fs::read(&path)?;
            messages.push(serde_json::from_slice(&raw)?);
        }
        Ok(messages)
    }
}

impl Mailer for SpoolMailer {
    fn send(&self, recipient: &str, message: &QuoteEmail) -> Result<(), MailError> {
        let queued_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        let spooled = SpooledMail {
            message_id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            queued_at_ms,
            email: message.clone(),
        };

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let stem = format!("{queued_at_ms:020}-{seq:08}-{}", spooled.message_id);
        let tmp_path = self.dir.join(format!("{stem}.tmp"));
        let final_path = self.dir.join(format!("{stem}.json"));
        fs::write(&tmp_path, serde_json::to_vec_pretty(&spooled)?)?;
        fs::rename(&tmp_path, &final_path)?;

        info!(
            "event=mail_spool module=mail status=ok message_id={}",
            spooled.message_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SpoolMailer;
    use crate::mail::{Mailer, QuoteEmail};

    fn email(subject: &str) -> QuoteEmail {
        QuoteEmail {
            subject: subject.to_string(),
            text_body: "text".to_string(),
            html_body: "<p>html</p>".to_string(),
        }
    }

    #[test]
    fn send_writes_one_json_file_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = SpoolMailer::new(dir.path().join("outbox")).unwrap();

        mailer.send("a@example.com", &email("first")).unwrap();
        mailer.send("b@example.com", &email("second")).unwrap();

        let spooled = mailer.list_spooled().unwrap();
        assert_eq!(spooled.len(), 2);
        let recipients: Vec<&str> = spooled.iter().map(|m| m.recipient.as_str()).collect();
        assert!(recipients.contains(&"a@example.com"));
        assert!(recipients.contains(&"b@example.com"));

        let leftovers = std::fs::read_dir(mailer.dir())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn spooled_file_is_flat_json() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = SpoolMailer::new(dir.path()).unwrap();
        mailer.send("a@example.com", &email("subject line")).unwrap();

        let path = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(value["recipient"], "a@example.com");
        assert_eq!(value["subject"], "subject line");
        assert_eq!(value["html_body"], "<p>html</p>");
    }
}
