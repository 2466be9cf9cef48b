//! Email address type with optional display name.
//!
//! Used for both the campaign's sender identity and per-contact recipients.

use crate::error::MailError;
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An email address with an optional display name.
///
/// # Examples
///
/// ```
/// use mailshot::Address;
///
/// let addr: Address = "news@example.com".into();
/// assert_eq!(addr.email, "news@example.com");
/// assert_eq!(addr.name, None);
///
/// let addr: Address = ("Newsletter", "news@example.com").into();
/// assert_eq!(addr.formatted(), "Newsletter <news@example.com>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Optional display name (e.g., "Acme Newsletter")
    pub name: Option<String>,
    /// Email address (e.g., "news@acme.com")
    pub email: String,
}

impl Address {
    /// Create an address without validation.
    ///
    /// Logs a warning when the value is obviously not an email. Use
    /// [`Address::parse`] when the input is untrusted.
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();
        if !looks_like_email(&email) {
            tracing::warn!(email = %email, "Address created from suspicious value");
        }
        Self { name: None, email }
    }

    /// Create an address with a display name, without validation.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        let mut addr = Self::new(email);
        addr.name = Some(name.into());
        addr
    }

    /// Parse and validate an address (RFC 5322 via `email_address`).
    ///
    /// ```
    /// use mailshot::Address;
    ///
    /// assert!(Address::parse("user@example.com").is_ok());
    /// assert!(Address::parse("not-an-email").is_err());
    /// ```
    pub fn parse(email: &str) -> Result<Self, MailError> {
        if !EmailAddress::is_valid(email) {
            return Err(MailError::InvalidAddress(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        Ok(Self {
            name: None,
            email: email.to_string(),
        })
    }

    /// Parse and validate an address with a display name.
    ///
    /// An empty name is stored as `None`.
    pub fn parse_with_name(name: &str, email: &str) -> Result<Self, MailError> {
        let mut addr = Self::parse(email)?;
        if !name.is_empty() {
            addr.name = Some(name.to_string());
        }
        Ok(addr)
    }

    /// Format as `Name <email>`, or just `email` when there is no name.
    pub fn formatted(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.email),
            _ => self.email.clone(),
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    !email.is_empty() && email.contains('@')
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

impl<N: Into<String>, E: Into<String>> From<(N, E)> for Address {
    fn from((name, email): (N, E)) -> Self {
        Self::with_name(name, email)
    }
}
