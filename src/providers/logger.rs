//! Dry-run transport: every email is accepted and written to the log.
//!
//! `EMAIL_PROVIDER=logger` runs a whole campaign without touching an inbox.
//! Each line carries the campaign id (from the `X-Campaign-Id` header) so a
//! dry run can be grepped per campaign. `logger_full` also logs the rendered
//! body at debug level.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};

/// Header the bulk sender stamps on every campaign email.
const CAMPAIGN_HEADER: &str = "X-Campaign-Id";

/// Transport that logs emails instead of sending them.
#[derive(Debug, Default)]
pub struct LoggerMailer {
    log_body: bool,
    logged: AtomicUsize,
}

impl LoggerMailer {
    /// Log recipient, subject and campaign only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log the rendered body.
    pub fn full() -> Self {
        Self::new().log_body(true)
    }

    pub fn log_body(mut self, enabled: bool) -> Self {
        self.log_body = enabled;
        self
    }

    /// Emails accepted so far.
    pub fn logged(&self) -> usize {
        self.logged.load(Ordering::Relaxed)
    }
}

/// Campaign an email belongs to, or `-` for one-off sends.
fn campaign_of(email: &Email) -> &str {
    email
        .headers
        .get(CAMPAIGN_HEADER)
        .map(String::as_str)
        .unwrap_or("-")
}

#[async_trait]
impl Mailer for LoggerMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let to = email.to.first().ok_or(MailError::MissingField("to"))?;
        let message_id = uuid::Uuid::new_v4().to_string();
        let seq = self.logged.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::info!(
            campaign_id = campaign_of(email),
            seq,
            message_id = %message_id,
            to = %to.email,
            subject = %email.subject,
            "Dry run: email not sent"
        );

        if self.log_body {
            let body = email.html_body.as_deref().or(email.text_body.as_deref());
            tracing::debug!(
                campaign_id = campaign_of(email),
                message_id = %message_id,
                from = ?email.from.as_ref().map(|a| a.formatted()),
                html = email.html_body.is_some(),
                body = body.unwrap_or(""),
                "Dry run body"
            );
        }

        Ok(DeliveryResult::new(message_id))
    }

    async fn probe(&self) -> Result<(), MailError> {
        tracing::debug!("Dry run transport is always reachable");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }
}
