//! Outgoing mail.
//!
//! # Data Flow
//! ```text
//! UserService / InviteService
//!     → templates.rs (subject + HTML body)
//!     → Mailer
//!         → smtp.rs (lettre, STARTTLS relay)
//!         → log.rs  (log recipient and subject only)
//! ```

pub mod log;
pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{EmailConfig, MailTransport};

pub use self::log::LogMailer;
pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address '{0}'")]
    InvalidAddress(String),

    #[error("Could not build message: {0}")]
    Build(String),

    #[error("Mail transport error: {0}")]
    Transport(String),
}

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Build the mailer selected by `email.transport`.
pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer::new())),
        MailTransport::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
    }
}
