//! Error types for mailshot.

use thiserror::Error;

use crate::campaign::{CampaignId, CampaignStatus};

/// Errors that can occur when talking to a mail transport.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Error building the email message.
    #[error("Build error: {0}")]
    BuildError(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    SendError(String),

    /// Transport did not answer within the configured timeout.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Connectivity probe failed (unreachable or unauthenticated).
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    /// Provider-specific error with details.
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        provider: &'static str,
        message: String,
        /// Optional HTTP status code
        status: Option<u16>,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl MailError {
    /// Create a provider error with HTTP status.
    pub fn provider_with_status(
        provider: &'static str,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
            status: Some(status),
        }
    }
}

#[cfg(feature = "_http")]
impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::BuildError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::SendError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

/// Errors raised while setting up, launching or persisting a campaign.
///
/// Setup variants (`NoContacts`, `TemplateNotFound`, `TransportUnavailable`)
/// mark the campaign `Failed`; per-recipient problems never surface here.
#[derive(Debug, Clone, Error)]
pub enum CampaignError {
    /// The contact list was empty when the run started.
    #[error("No contacts to send to")]
    NoContacts,

    /// The campaign's template does not exist.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The transport probe failed.
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// No campaign with this id.
    #[error("Campaign not found: {0}")]
    NotFound(CampaignId),

    /// The campaign was already launched.
    #[error("Campaign {0} already started")]
    AlreadyStarted(CampaignId),

    /// Status change that would move the lifecycle backwards.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    /// Backing store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// No Tokio runtime, or the campaign task died.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for CampaignError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CampaignError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Errors raised while importing or exporting contacts.
#[derive(Debug, Error)]
pub enum ContactError {
    /// CSV has no column that looks like an email column.
    #[error("Email column not found in CSV header")]
    MissingEmailColumn,

    /// Underlying CSV reader/writer failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O failure while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown contact list.
    #[error("Contact list not found: {0}")]
    ListNotFound(String),

    /// Rejected email address.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}
