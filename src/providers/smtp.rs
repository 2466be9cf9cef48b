//! SMTP transport using lettre.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailshot::providers::SmtpMailer;
//!
//! // Outlook / Office 365 submission port with STARTTLS
//! let mailer = SmtpMailer::new("smtp.office365.com", 587)
//!     .credentials("user@outlook.com", "app-password")
//!     .build();
//!
//! // Local relay, no TLS, no auth
//! let mailer = SmtpMailer::localhost();
//! ```

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};

/// SMTP email provider.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer builder with TLS (STARTTLS on port 587).
    pub fn new(host: &str, port: u16) -> SmtpBuilder {
        SmtpBuilder {
            host: host.to_string(),
            port,
            credentials: None,
            tls: TlsMode::StartTls,
        }
    }

    /// Create a new SMTP mailer for localhost (no TLS, no auth).
    pub fn localhost() -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost")
            .port(25)
            .build();

        Self { transport }
    }

    /// Build a lettre Message from our Email struct.
    ///
    /// Custom headers are not forwarded; lettre needs a typed header per name.
    fn build_message(&self, email: &Email) -> Result<Message, MailError> {
        let from = email
            .from
            .as_ref()
            .ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut builder = Message::builder()
            .from(address_to_mailbox(from)?)
            .subject(&email.subject);

        for to in &email.to {
            builder = builder.to(address_to_mailbox(to)?);
        }

        let message = match (&email.html_body, &email.text_body) {
            (Some(html), Some(text)) => {
                builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))?
            }
            (Some(html), None) => builder.header(ContentType::TEXT_HTML).body(html.clone())?,
            (None, Some(text)) => builder.header(ContentType::TEXT_PLAIN).body(text.clone())?,
            (None, None) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(String::new())?,
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let message = self.build_message(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| MailError::SendError(e.to_string()))?;

        // Extract message ID from SMTP response, or generate one
        let message_id = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(DeliveryResult::new(message_id))
    }

    /// Connect, negotiate TLS and authenticate without sending anything.
    async fn probe(&self) -> Result<(), MailError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(MailError::ProbeFailed(
                "SMTP server did not accept the connection".into(),
            )),
            Err(e) => Err(MailError::ProbeFailed(e.to_string())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }
}

/// TLS mode for SMTP connection.
#[derive(Debug, Clone, Copy)]
pub enum TlsMode {
    /// No TLS (dangerous, only for localhost)
    None,
    /// STARTTLS - upgrade to TLS after connecting (port 587)
    StartTls,
    /// Implicit TLS - connect with TLS from start (port 465)
    Tls,
}

/// Builder for SmtpMailer.
pub struct SmtpBuilder {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    tls: TlsMode,
}

impl SmtpBuilder {
    /// Set SMTP credentials.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username.to_string(), password.to_string()));
        self
    }

    /// Set TLS mode.
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }

    /// Build the SmtpMailer.
    ///
    /// If the relay cannot be set up for the requested TLS mode the builder
    /// falls back to a plain connection and logs a warning.
    pub fn build(self) -> SmtpMailer {
        let builder = match self.tls {
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        host = %self.host,
                        error = %e,
                        "STARTTLS unavailable, using plain SMTP"
                    );
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
                }),
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        host = %self.host,
                        error = %e,
                        "TLS unavailable, using plain SMTP"
                    );
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
                }),
        };

        let mut builder = builder.port(self.port);
        if let Some(creds) = self.credentials {
            builder = builder.credentials(creds);
        }

        SmtpMailer {
            transport: builder.build(),
        }
    }
}

/// Convert our Address to lettre's Mailbox.
fn address_to_mailbox(addr: &Address) -> Result<Mailbox, MailError> {
    let email = addr.email.parse()?;
    Ok(Mailbox::new(addr.name.clone(), email))
}
