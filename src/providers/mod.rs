//! Mail transports.
//!
//! Each provider implements the [`Mailer`](crate::Mailer) trait.
//!
//! ## Available Providers
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`SmtpMailer`] | `smtp` | SMTP via lettre |
//! | [`SendGridMailer`] | `sendgrid` | SendGrid v3 API |
//! | [`LocalMailer`] | `local` | In-memory capture with failure injection |
//! | [`LoggerMailer`] | (none) | Logs emails without sending |

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpBuilder, SmtpMailer, TlsMode};

#[cfg(feature = "sendgrid")]
mod sendgrid;
#[cfg(feature = "sendgrid")]
pub use sendgrid::SendGridMailer;

#[cfg(feature = "local")]
mod local;
#[cfg(feature = "local")]
pub use local::{Attempt, CapturedEmail, LocalMailer};

mod logger;
pub use logger::LoggerMailer;
