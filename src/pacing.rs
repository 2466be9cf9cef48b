//! Send policy (batching, delays, timeouts) and the pacer that applies it.

use async_trait::async_trait;
use std::env;
use std::ops::Range;
use std::time::Duration;

/// Pacing and reporting knobs for a bulk send.
///
/// Defaults keep a single sender well under typical provider throttles:
/// 100-email batches, 6 s between emails, 60 s between batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPolicy {
    /// Largest number of emails sent back to back before a batch pause
    pub batch_size: usize,
    /// Pause between two emails of the same batch
    pub email_delay: Duration,
    /// Pause between two batches; longer than `email_delay` unless both are zero
    pub batch_delay: Duration,
    /// Upper bound for a single `deliver` call
    pub send_timeout: Duration,
    /// Cap on failure notes kept in the report
    pub max_error_notes: usize,
    /// Substituted for `{{name}}` when a contact has no name
    pub default_name: String,
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self {
            batch_size: 100,
            email_delay: Duration::from_secs(6),
            batch_delay: Duration::from_secs(60),
            send_timeout: Duration::from_secs(30),
            max_error_notes: 50,
            default_name: "Friend".to_string(),
        }
    }
}

impl SendPolicy {
    /// Read the policy from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BATCH_SIZE` | 100 |
    /// | `DELAY_BETWEEN_EMAILS` | 6 (seconds) |
    /// | `BATCH_DELAY` | 60 (seconds) |
    /// | `SEND_TIMEOUT` | 30 (seconds) |
    /// | `MAX_ERROR_NOTES` | 50 |
    /// | `DEFAULT_RECIPIENT_NAME` | Friend |
    ///
    /// Unparseable values fall back to the default with a warning. A
    /// `BATCH_DELAY` that does not exceed `DELAY_BETWEEN_EMAILS` is raised to
    /// twice the email delay.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let policy = Self {
            batch_size: env_parse("BATCH_SIZE", defaults.batch_size).max(1),
            email_delay: Duration::from_secs(env_parse(
                "DELAY_BETWEEN_EMAILS",
                defaults.email_delay.as_secs(),
            )),
            batch_delay: Duration::from_secs(env_parse(
                "BATCH_DELAY",
                defaults.batch_delay.as_secs(),
            )),
            send_timeout: Duration::from_secs(env_parse(
                "SEND_TIMEOUT",
                defaults.send_timeout.as_secs(),
            )),
            max_error_notes: env_parse("MAX_ERROR_NOTES", defaults.max_error_notes),
            default_name: env::var("DEFAULT_RECIPIENT_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_name),
        };
        policy.with_batch_gap()
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the pause between emails. Raises `batch_delay` if it no longer
    /// exceeds the new value.
    pub fn email_delay(mut self, delay: Duration) -> Self {
        self.email_delay = delay;
        self.with_batch_gap()
    }

    /// Set the pause between batches, raised to twice `email_delay` when it
    /// is not longer than that.
    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self.with_batch_gap()
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn max_error_notes(mut self, max: usize) -> Self {
        self.max_error_notes = max;
        self
    }

    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    /// Policy with no pauses, for tests and local dry runs.
    pub fn immediate() -> Self {
        Self::default()
            .email_delay(Duration::ZERO)
            .batch_delay(Duration::ZERO)
    }

    /// The pause actually taken between batches.
    ///
    /// Same as `batch_delay` when that exceeds `email_delay` (or both are
    /// zero), otherwise twice `email_delay`. Covers policies whose fields were
    /// assigned directly.
    pub fn effective_batch_delay(&self) -> Duration {
        if self.batch_delay > self.email_delay || self.email_delay.is_zero() {
            self.batch_delay
        } else {
            self.email_delay.saturating_mul(2)
        }
    }

    fn with_batch_gap(mut self) -> Self {
        let effective = self.effective_batch_delay();
        if effective != self.batch_delay {
            tracing::warn!(
                batch_delay_secs = self.batch_delay.as_secs_f64(),
                email_delay_secs = self.email_delay.as_secs_f64(),
                raised_to_secs = effective.as_secs_f64(),
                "Batch delay must exceed email delay, raising it"
            );
            self.batch_delay = effective;
        }
        self
    }

    /// Split `total` items into consecutive batch ranges, in order.
    ///
    /// ```
    /// use mailshot::SendPolicy;
    ///
    /// let batches = SendPolicy::default().batch_size(100).batches(250);
    /// assert_eq!(batches, vec![0..100, 100..200, 200..250]);
    /// ```
    pub fn batches(&self, total: usize) -> Vec<Range<usize>> {
        let size = self.batch_size.max(1);
        (0..total)
            .step_by(size)
            .map(|start| start..(start + size).min(total))
            .collect()
    }
}

fn env_parse<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Which pause the orchestrator is taking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Between two emails of one batch
    BetweenEmails,
    /// Between two batches
    BetweenBatches,
}

/// Applies pauses between sends.
///
/// The default [`TokioPacer`] sleeps; tests substitute a recorder.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, kind: Pause, duration: Duration);
}

/// Cooperative sleep on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, _kind: Pause, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
