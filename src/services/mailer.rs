//! Outgoing mail.
//!
//! The server has no SMTP transport; the default [`LogMailer`] writes each
//! message to the log so operators can relay it. [`MemoryMailer`] keeps
//! messages in memory and is what the tests read verification and reset
//! tokens from.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};

/// A message ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery backend for account mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, mail: Mail) -> Result<()>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<()> {
        info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "Outgoing mail"
        );
        Ok(())
    }
}

/// Collects messages in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<Mail>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<Mail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    /// The most recent message addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<Mail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: Mail) -> Result<()> {
        self.outbox
            .lock()
            .map_err(|_| Error::Mail("outbox lock poisoned".to_string()))?
            .push(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str, subject: &str) -> Mail {
        Mail {
            from: "noreply@webhub.local".to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_memory_mailer_keeps_order() {
        let mailer = MemoryMailer::new();
        mailer.send(mail("a@example.com", "first")).await.unwrap();
        mailer.send(mail("b@example.com", "second")).await.unwrap();
        mailer.send(mail("a@example.com", "third")).await.unwrap();

        assert_eq!(mailer.sent().len(), 3);
        assert_eq!(mailer.last_to("a@example.com").unwrap().subject, "third");
        assert!(mailer.last_to("c@example.com").is_none());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_mail() {
        LogMailer.send(mail("a@example.com", "hello")).await.unwrap();
    }
}
