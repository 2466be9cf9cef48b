//! # Mailshot
//!
//! Personalized bulk email campaigns over SMTP or SendGrid, paced to stay
//! under provider throttles.
//!
//! ## Quick Start
//!
//! Set environment variables:
//! ```bash
//! EMAIL_PROVIDER=sendgrid
//! SENDGRID_API_KEY=SG.xxxxx
//! EMAIL_FROM=news@acme.com
//! EMAIL_FROM_NAME=Acme
//! ```
//!
//! Then run a campaign:
//! ```rust,ignore
//! use mailshot::{mailer_from_env, default_from, BulkSender, Contact, SendPolicy};
//!
//! let sender = BulkSender::new(mailer_from_env()?).with_policy(SendPolicy::from_env());
//! let contacts = vec![
//!     Contact::new("ana@example.com").name("Ana"),
//!     Contact::new("luis@example.com"),
//! ];
//! let from = default_from().expect("EMAIL_FROM set");
//!
//! let report = sender
//!     .run_campaign(&contacts, "Hello {{name}}", "<p>Hi {{name}}!</p>", &from)
//!     .await;
//! println!("{:?}: {}/{} sent", report.status, report.sent, report.total);
//! ```
//!
//! For stored lists, templates and background runs see [`CampaignRunner`].
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_PROVIDER` | `smtp`, `sendgrid`, `local`, `logger`, `logger_full` |
//! | `EMAIL_FROM` | Sender email |
//! | `EMAIL_FROM_NAME` | Sender name |
//! | `SMTP_HOST` | SMTP server host |
//! | `SMTP_PORT` | SMTP server port (default: 587) |
//! | `SMTP_USERNAME` | SMTP username |
//! | `SMTP_PASSWORD` | SMTP password |
//! | `SENDGRID_API_KEY` | SendGrid API key |
//!
//! Pacing variables (`BATCH_SIZE`, `DELAY_BETWEEN_EMAILS`, ...) are listed on
//! [`SendPolicy::from_env`].
//!
//! ## Feature Flags
//!
//! - `smtp` - SMTP provider via lettre
//! - `sendgrid` - SendGrid API provider
//! - `local` - LocalMailer for development and testing
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit Prometheus-style metrics:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mailshot_emails_total` | Counter | provider, status | Emails attempted |
//! | `mailshot_delivery_duration_seconds` | Histogram | provider | Delivery duration |
//! | `mailshot_campaigns_total` | Counter | status | Finished campaigns |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the mailshot crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod campaign;
mod contact;
mod email;
mod error;
mod mailer;
mod pacing;
mod runner;
mod sender;
mod store;
mod template;

pub mod providers;

use std::env;
use std::sync::Arc;

// Re-exports
pub use address::Address;
pub use campaign::{
    Campaign, CampaignId, CampaignProgress, CampaignStatus, SendOutcome, SendReport,
};
pub use contact::{export_csv, import_csv, import_text, validate_email, Contact, ImportReport};
pub use email::Email;
pub use error::{CampaignError, ContactError, MailError};
pub use mailer::{DeliveryResult, Mailer};
pub use pacing::{Pacer, Pause, SendPolicy, TokioPacer};
pub use runner::{CampaignHandle, CampaignRunner};
pub use sender::BulkSender;
pub use store::{CampaignStore, ContactStore, FileCampaignStore, MemoryStore, TemplateStore};
pub use template::{render, Template};

// ============================================================================
// Environment Configuration
// ============================================================================

/// Shared LocalMailer handed out for `EMAIL_PROVIDER=local`.
#[cfg(feature = "local")]
static LOCAL_MAILER: std::sync::OnceLock<providers::LocalMailer> = std::sync::OnceLock::new();

/// The LocalMailer used when `EMAIL_PROVIDER=local`, if one was created.
///
/// ```rust,ignore
/// let mailer = mailshot::mailer_from_env()?;
/// // ... run a campaign ...
/// let captured = mailshot::local_mailer().unwrap().emails();
/// ```
#[cfg(feature = "local")]
pub fn local_mailer() -> Option<providers::LocalMailer> {
    LOCAL_MAILER.get().cloned()
}

/// Get the sender address from environment.
pub fn default_from() -> Option<Address> {
    let email = env::var("EMAIL_FROM").ok()?;
    match env::var("EMAIL_FROM_NAME").ok().filter(|n| !n.trim().is_empty()) {
        Some(name) => Some(Address::with_name(name, email)),
        None => Some(Address::new(email)),
    }
}

/// Create a transport from environment variables.
///
/// Fails with [`MailError::Configuration`] when `EMAIL_PROVIDER` is unset or
/// unknown, when its credentials are missing, or when the matching feature
/// is not compiled in.
pub fn mailer_from_env() -> Result<Arc<dyn Mailer>, MailError> {
    let provider = env::var("EMAIL_PROVIDER")
        .map_err(|_| MailError::Configuration("EMAIL_PROVIDER not set".into()))?
        .to_lowercase();

    let mailer: Arc<dyn Mailer> = match provider.as_str() {
        #[cfg(feature = "smtp")]
        "smtp" => {
            let host = env::var("SMTP_HOST")
                .map_err(|_| MailError::Configuration("SMTP_HOST not set".into()))?;
            let port: u16 = match env::var("SMTP_PORT") {
                Ok(raw) => raw.trim().parse().map_err(|_| {
                    MailError::Configuration(format!("SMTP_PORT is not a port: {}", raw))
                })?,
                Err(_) => 587,
            };
            let username = env::var("SMTP_USERNAME").unwrap_or_default();
            let password = env::var("SMTP_PASSWORD").unwrap_or_default();

            let tls = if port == 465 {
                providers::TlsMode::Tls
            } else {
                providers::TlsMode::StartTls
            };
            let builder = providers::SmtpMailer::new(&host, port).tls(tls);
            let mailer = if username.is_empty() {
                builder.build()
            } else {
                builder.credentials(&username, &password).build()
            };
            Arc::new(mailer)
        }
        #[cfg(not(feature = "smtp"))]
        "smtp" => {
            return Err(MailError::Configuration(
                "EMAIL_PROVIDER=smtp but 'smtp' feature is not enabled. \
                Add `features = [\"smtp\"]` to Cargo.toml"
                    .into(),
            ))
        }

        #[cfg(feature = "sendgrid")]
        "sendgrid" => {
            let key = env::var("SENDGRID_API_KEY")
                .map_err(|_| MailError::Configuration("SENDGRID_API_KEY not set".into()))?;
            Arc::new(providers::SendGridMailer::new(key))
        }
        #[cfg(not(feature = "sendgrid"))]
        "sendgrid" => {
            return Err(MailError::Configuration(
                "EMAIL_PROVIDER=sendgrid but 'sendgrid' feature is not enabled. \
                Add `features = [\"sendgrid\"]` to Cargo.toml"
                    .into(),
            ))
        }

        #[cfg(feature = "local")]
        "local" => Arc::new(LOCAL_MAILER.get_or_init(providers::LocalMailer::new).clone()),
        #[cfg(not(feature = "local"))]
        "local" => {
            return Err(MailError::Configuration(
                "EMAIL_PROVIDER=local but 'local' feature is not enabled. \
                Add `features = [\"local\"]` to Cargo.toml"
                    .into(),
            ))
        }

        "logger" => Arc::new(providers::LoggerMailer::new()),
        "logger_full" => Arc::new(providers::LoggerMailer::full()),

        _ => {
            return Err(MailError::Configuration(format!(
                "Unknown EMAIL_PROVIDER: {}. Valid providers are: smtp, sendgrid, local, logger, logger_full",
                provider
            )))
        }
    };

    tracing::debug!(provider = mailer.provider_name(), "Mailer configured from environment");
    Ok(mailer)
}

/// Check if email is configured (env vars are set and feature is enabled).
///
/// Logs a warning if the provider is specified but the feature flag is not enabled.
pub fn is_configured() -> bool {
    let Ok(provider) = env::var("EMAIL_PROVIDER") else {
        return false;
    };
    match provider.to_lowercase().as_str() {
        #[cfg(feature = "smtp")]
        "smtp" => env::var("SMTP_HOST").is_ok(),
        #[cfg(not(feature = "smtp"))]
        "smtp" => {
            tracing::warn!(
                "EMAIL_PROVIDER=smtp but 'smtp' feature is not enabled. \
                Add `features = [\"smtp\"]` to Cargo.toml"
            );
            false
        }

        #[cfg(feature = "sendgrid")]
        "sendgrid" => env::var("SENDGRID_API_KEY").is_ok(),
        #[cfg(not(feature = "sendgrid"))]
        "sendgrid" => {
            tracing::warn!(
                "EMAIL_PROVIDER=sendgrid but 'sendgrid' feature is not enabled. \
                Add `features = [\"sendgrid\"]` to Cargo.toml"
            );
            false
        }

        #[cfg(feature = "local")]
        "local" => true,
        #[cfg(not(feature = "local"))]
        "local" => {
            tracing::warn!(
                "EMAIL_PROVIDER=local but 'local' feature is not enabled. \
                Add `features = [\"local\"]` to Cargo.toml"
            );
            false
        }

        "logger" | "logger_full" => true,

        _ => false,
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        default_from, is_configured, mailer_from_env, Address, BulkSender, Campaign,
        CampaignError, CampaignRunner, CampaignStatus, Contact, Email, MailError, Mailer,
        MemoryStore, SendPolicy, SendReport, Template,
    };
}
