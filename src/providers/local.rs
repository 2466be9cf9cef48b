//! Local mailer for development and testing.
//!
//! Captures emails in memory, in send order, and can be told to fail, stall
//! or panic for chosen recipients so campaign error paths can be exercised
//! without a network.
//!
//! # Testing Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mailshot::{BulkSender, Contact, SendPolicy};
//! use mailshot::providers::LocalMailer;
//!
//! #[tokio::test]
//! async fn test_one_bad_recipient() {
//!     let mailer = Arc::new(LocalMailer::new());
//!     mailer.fail_for("b@example.com", "mailbox full");
//!
//!     let sender = BulkSender::new(mailer.clone()).with_policy(SendPolicy::immediate());
//!     let report = sender.run_campaign(&contacts, "Hi", "Hello {{name}}", &from).await;
//!
//!     assert_eq!(report.failed, 1);
//!     assert!(mailer.sent_to("a@example.com"));
//! }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};

/// Email captured by [`LocalMailer`].
#[derive(Debug, Clone)]
pub struct CapturedEmail {
    pub message_id: String,
    pub email: Email,
}

/// One call to `deliver`, successful or not.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// First recipient of the email
    pub to: String,
    /// Tokio clock reading when the call started
    pub at: Instant,
}

/// What to do for one specific recipient.
#[derive(Debug, Clone)]
enum Behavior {
    Fail(String),
    Stall(Duration),
    Panic(String),
}

#[derive(Debug, Default)]
struct State {
    emails: Vec<CapturedEmail>,
    attempts: Vec<Attempt>,
    fail_with: Option<String>,
    probe_failure: Option<String>,
    delay: Option<Duration>,
    per_recipient: HashMap<String, Behavior>,
}

/// Local mailer that stores emails in memory.
///
/// Clones share captured emails and failure settings.
#[derive(Debug, Clone, Default)]
pub struct LocalMailer {
    state: std::sync::Arc<RwLock<State>>,
}

impl LocalMailer {
    /// Create a new local mailer with empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Failure Simulation (for testing)
    // =========================================================================

    /// Make every delivery fail with `message`.
    pub fn set_failure(&self, message: impl Into<String>) {
        self.state.write().fail_with = Some(message.into());
    }

    /// Clear the global failure and every per-recipient behavior.
    pub fn clear_failure(&self) {
        let mut state = self.state.write();
        state.fail_with = None;
        state.per_recipient.clear();
    }

    /// Fail deliveries to one recipient.
    pub fn fail_for(&self, recipient: &str, message: impl Into<String>) {
        self.set_behavior(recipient, Behavior::Fail(message.into()));
    }

    /// Stall deliveries to one recipient for `duration` before succeeding.
    pub fn stall_for(&self, recipient: &str, duration: Duration) {
        self.set_behavior(recipient, Behavior::Stall(duration));
    }

    /// Panic while delivering to one recipient.
    pub fn panic_for(&self, recipient: &str, message: impl Into<String>) {
        self.set_behavior(recipient, Behavior::Panic(message.into()));
    }

    /// Make [`probe`](Mailer::probe) fail.
    pub fn set_probe_failure(&self, message: impl Into<String>) {
        self.state.write().probe_failure = Some(message.into());
    }

    /// Delay every delivery by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().delay = Some(delay);
    }

    fn set_behavior(&self, recipient: &str, behavior: Behavior) {
        self.state
            .write()
            .per_recipient
            .insert(recipient.to_ascii_lowercase(), behavior);
    }

    // =========================================================================
    // Email Access (for testing assertions)
    // =========================================================================

    /// All captured emails, in send order.
    pub fn emails(&self) -> Vec<CapturedEmail> {
        self.state.read().emails.clone()
    }

    /// The most recently sent email.
    pub fn last_email(&self) -> Option<CapturedEmail> {
        self.state.read().emails.last().cloned()
    }

    pub fn email_count(&self) -> usize {
        self.state.read().emails.len()
    }

    /// Every `deliver` call in order, including failed ones.
    pub fn attempts(&self) -> Vec<Attempt> {
        self.state.read().attempts.clone()
    }

    /// Recipients of captured emails, in send order.
    pub fn recipients(&self) -> Vec<String> {
        self.state
            .read()
            .emails
            .iter()
            .filter_map(|c| c.email.to.first().map(|a| a.email.clone()))
            .collect()
    }

    /// Check if an email was sent to a specific address.
    pub fn sent_to(&self, email: &str) -> bool {
        self.state.read().emails.iter().any(|captured| {
            captured
                .email
                .to
                .iter()
                .any(|addr| addr.email.eq_ignore_ascii_case(email))
        })
    }

    /// Remove and return all captured emails.
    pub fn flush(&self) -> Vec<CapturedEmail> {
        let mut state = self.state.write();
        state.attempts.clear();
        std::mem::take(&mut state.emails)
    }
}

#[async_trait]
impl Mailer for LocalMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let to = email
            .to
            .first()
            .map(|a| a.email.to_ascii_lowercase())
            .unwrap_or_default();

        let (behavior, fail_with, delay) = {
            let mut state = self.state.write();
            state.attempts.push(Attempt {
                to: to.clone(),
                at: Instant::now(),
            });
            (
                state.per_recipient.get(&to).cloned(),
                state.fail_with.clone(),
                state.delay,
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match behavior {
            Some(Behavior::Fail(message)) => return Err(MailError::SendError(message)),
            Some(Behavior::Stall(duration)) => tokio::time::sleep(duration).await,
            Some(Behavior::Panic(message)) => panic!("{}", message),
            None => {}
        }

        if let Some(message) = fail_with {
            return Err(MailError::SendError(message));
        }

        let message_id = uuid::Uuid::new_v4().to_string();
        self.state.write().emails.push(CapturedEmail {
            message_id: message_id.clone(),
            email: email.clone(),
        });
        Ok(DeliveryResult::new(message_id))
    }

    async fn probe(&self) -> Result<(), MailError> {
        match self.state.read().probe_failure.clone() {
            Some(message) => Err(MailError::ProbeFailed(message)),
            None => Ok(()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}
