//! Mail transport trait and delivery result types.
//!
//! # Why `async_trait`?
//!
//! Transports are selected at runtime from `EMAIL_PROVIDER` and shared across
//! campaign tasks as `Arc<dyn Mailer>`. Native async traits are not object
//! safe, so the futures are boxed. One allocation per send is noise next to a
//! network round trip and the pacing delay between sends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::error::MailError;

/// Result of a successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Message ID assigned by the provider
    pub message_id: String,
    /// Optional provider-specific response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

impl DeliveryResult {
    /// Create a new delivery result with just a message ID.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: None,
        }
    }

    /// Create a delivery result with provider response.
    pub fn with_response(message_id: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: Some(response),
        }
    }
}

/// A mail transport: SMTP relay, HTTP API, or an in-process stand-in.
///
/// The orchestrator only ever calls [`probe`](Mailer::probe) once per run and
/// then [`deliver`](Mailer::deliver) once per recipient, one at a time.
///
/// ```ignore
/// use mailshot::{Email, Mailer};
/// use mailshot::providers::SendGridMailer;
///
/// let mailer = SendGridMailer::new("SG.xxxxx");
/// mailer.probe().await?;
///
/// let email = Email::new()
///     .from("news@acme.com")
///     .to("ana@example.com")
///     .subject("Hello")
///     .text_body("Hi Ana");
/// mailer.deliver(&email).await?;
/// ```
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a single email.
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError>;

    /// Lightweight reachability/authentication check.
    ///
    /// Must not send mail. The default assumes the transport is always
    /// available.
    async fn probe(&self) -> Result<(), MailError> {
        Ok(())
    }

    /// Get the provider name (for logging/metrics).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }
}

#[async_trait]
impl<M: Mailer + ?Sized> Mailer for std::sync::Arc<M> {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        (**self).deliver(email).await
    }

    async fn probe(&self) -> Result<(), MailError> {
        (**self).probe().await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}
