use serde::Serialize;
use std::sync::Arc;

use crate::accounts::UserStore;
use crate::config::InviteConfig;
use crate::mail::{templates, Mailer};
use crate::services::{validate_email, ServiceResult};

#[derive(Debug, Clone, Default, Serialize)]
pub struct InviteReport {
    /// Addresses an invite was delivered to.
    pub sent: Vec<String>,
    /// Addresses skipped as malformed or undeliverable.
    pub failed: Vec<String>,
}

/// Invites people to take part in elections.
///
/// Registered users get a login link; unknown addresses a sign-up link.
pub struct InviteService {
    store: UserStore,
    mailer: Arc<dyn Mailer>,
    links: InviteConfig,
}

impl InviteService {
    pub fn new(store: UserStore, mailer: Arc<dyn Mailer>, links: InviteConfig) -> Self {
        Self {
            store,
            mailer,
            links,
        }
    }

    pub async fn send_invites(&self, emails: &[String]) -> ServiceResult<InviteReport> {
        let mut report = InviteReport::default();
        for email in emails {
            let email = email.trim();
            if validate_email(email).is_err() {
                report.failed.push(email.to_string());
                continue;
            }
            let mail = match self.store.find_by_email(email) {
                Some(user) => templates::login_invite(email, &user.name, &self.links.login_url),
                None => templates::signup_invite(email, &self.links.signup_url),
            };
            match self.mailer.send(mail).await {
                Ok(()) => report.sent.push(email.to_string()),
                Err(e) => {
                    tracing::warn!(to = %email, error = %e, "Invite not delivered");
                    report.failed.push(email.to_string());
                }
            }
        }
        tracing::info!(sent = report.sent.len(), failed = report.failed.len(), "Invites processed");
        Ok(report)
    }
}
