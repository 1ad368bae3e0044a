//! Mailer that only logs. Keeps an outbox so callers can inspect what was sent.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::mail::{MailError, Mailer, OutgoingMail};

#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    outbox: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn outbox(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail (log transport)");
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(mail);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outbox_records_mail() {
        let mailer = LogMailer::new();
        let handle = mailer.clone();
        mailer
            .send(OutgoingMail {
                to: "ana@example.com".into(),
                subject: "Olá".into(),
                html: "<html></html>".into(),
            })
            .await
            .unwrap();
        assert_eq!(handle.outbox().len(), 1);
        assert_eq!(handle.outbox()[0].to, "ana@example.com");
    }
}
