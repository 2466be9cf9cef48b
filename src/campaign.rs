//! Campaign record and lifecycle.
//!
//! A campaign moves `Pending -> Running -> {Completed | Failed}` (or straight
//! from `Pending` to `Failed` when setup fails) and never backwards. Counters
//! only grow, and `sent + failed <= total` holds after every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CampaignError;

/// Campaign identifier.
pub type CampaignId = Uuid;

/// Lifecycle state of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Whether `self -> next` is a forward transition.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Failed) | (Running, Completed) | (Running, Failed)
        )
    }

    /// `Completed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Failed(String),
}

/// Persisted state of one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    /// Contact list this campaign sends to
    pub list_id: String,
    /// Template this campaign renders
    pub template_id: String,
    pub status: CampaignStatus,
    /// Contact count snapshotted when the run started
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    /// Batches started so far; a list within the batch size counts as one
    #[serde(default)]
    pub batches: usize,
    /// Bounded failure notes (`"failed: <email>"`)
    pub errors: Vec<String>,
    /// Why the campaign could not run, for `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// New `Pending` campaign.
    pub fn new(
        name: impl Into<String>,
        list_id: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            list_id: list_id.into(),
            template_id: template_id.into(),
            status: CampaignStatus::Pending,
            total: 0,
            sent: 0,
            failed: 0,
            batches: 0,
            errors: Vec::new(),
            failure_reason: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    fn transition(&mut self, next: CampaignStatus) -> Result<(), CampaignError> {
        if !self.status.can_transition_to(next) {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `Pending -> Running`, fixing `total` for the rest of the run.
    pub fn start(&mut self, total: usize) -> Result<(), CampaignError> {
        self.transition(CampaignStatus::Running)?;
        self.total = total;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Count one outcome; notes are kept while fewer than `max_notes` exist.
    ///
    /// Outcomes beyond `total` are rejected so the counters never overshoot.
    pub fn record(
        &mut self,
        email: &str,
        outcome: &SendOutcome,
        max_notes: usize,
    ) -> Result<(), CampaignError> {
        if self.status != CampaignStatus::Running {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: CampaignStatus::Running,
            });
        }
        if self.processed() >= self.total {
            return Err(CampaignError::Store(format!(
                "outcome for {} exceeds total of {}",
                email, self.total
            )));
        }
        match outcome {
            SendOutcome::Sent => self.sent += 1,
            SendOutcome::Failed(_) => {
                self.failed += 1;
                if self.errors.len() < max_notes {
                    self.errors.push(format!("failed: {}", email));
                }
            }
        }
        Ok(())
    }

    /// Note that another batch has begun.
    pub fn begin_batch(&mut self) {
        self.batches += 1;
    }

    /// `Running -> Completed`.
    pub fn complete(&mut self) -> Result<(), CampaignError> {
        self.transition(CampaignStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `Pending | Running -> Failed`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CampaignError> {
        self.transition(CampaignStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `sent + failed`.
    pub fn processed(&self) -> usize {
        self.sent + self.failed
    }

    /// Polling view of this record.
    pub fn progress(&self) -> CampaignProgress {
        CampaignProgress {
            id: self.id,
            status: self.status,
            sent: self.sent,
            failed: self.failed,
            total: self.total,
            percent: if self.total > 0 {
                self.processed() as f64 / self.total as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time snapshot served to status pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignProgress {
    pub id: CampaignId,
    pub status: CampaignStatus,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    /// Processed share of `total`, 0-100
    pub percent: f64,
}

/// Aggregate result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReport {
    pub status: CampaignStatus,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    /// Batches the contacts were sent in
    pub batches: usize,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<&Campaign> for SendReport {
    fn from(c: &Campaign) -> Self {
        Self {
            status: c.status,
            total: c.total,
            sent: c.sent,
            failed: c.failed,
            batches: c.batches,
            errors: c.errors.clone(),
            failure_reason: c.failure_reason.clone(),
        }
    }
}
