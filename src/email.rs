//! Outgoing message handed to a [`Mailer`](crate::Mailer).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::Address;

/// One rendered message for one recipient.
///
/// The orchestrator builds one of these per contact; transports translate it
/// to their wire format.
///
/// ```
/// use mailshot::Email;
///
/// let email = Email::new()
///     .from(("Acme", "news@acme.com"))
///     .to("ana@example.com")
///     .subject("Hello Ana")
///     .html_body("<p>Hi Ana</p>");
/// assert_eq!(email.to.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Email {
    /// Sender identity
    pub from: Option<Address>,
    /// Recipients
    pub to: Vec<Address>,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text_body: Option<String>,
    /// HTML body
    pub html_body: Option<String>,
    /// Extra headers (e.g. `X-Campaign`)
    pub headers: BTreeMap<String, String>,
}

impl Email {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    pub fn from(mut self, addr: impl Into<Address>) -> Self {
        self.from = Some(addr.into());
        self
    }

    /// Add a recipient.
    pub fn to(mut self, addr: impl Into<Address>) -> Self {
        self.to.push(addr.into());
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the plain text body.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Set the HTML body.
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Set the body, choosing HTML when the content starts with a tag.
    pub fn body(self, body: impl Into<String>) -> Self {
        let body = body.into();
        if body.trim_start().starts_with('<') {
            self.html_body(body)
        } else {
            self.text_body(body)
        }
    }

    /// Add a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Recipient emails, for logging.
    pub(crate) fn recipients(&self) -> Vec<&str> {
        self.to.iter().map(|a| a.email.as_str()).collect()
    }
}
