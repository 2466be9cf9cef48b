//! Campaign control surface: create, launch in the background, poll.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mailshot::{BulkSender, CampaignRunner, MemoryStore, Template};
//!
//! let store = MemoryStore::shared();
//! store.put_template("welcome", Template::new("Welcome", "Hi {{name}}", "<p>Hello {{name}}</p>"));
//!
//! let runner = CampaignRunner::new(store, BulkSender::new(mailer), "news@acme.com".into());
//! let campaign = runner.create_campaign("Spring", "customers", "welcome")?;
//! let handle = runner.start_campaign(campaign.id)?;   // returns immediately
//!
//! let progress = runner.get_campaign_status(campaign.id)?;
//! println!("{}% ({}/{})", progress.percent, progress.sent, progress.total);
//!
//! let report = handle.wait().await?;
//! ```

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::address::Address;
use crate::campaign::{Campaign, CampaignId, CampaignProgress, CampaignStatus, SendReport};
use crate::error::CampaignError;
use crate::sender::{panic_message, BulkSender};
use crate::store::{CampaignStore, ContactStore, MemoryStore, TemplateStore};

/// Launches campaigns on background tasks and serves their status.
pub struct CampaignRunner {
    contacts: Arc<dyn ContactStore>,
    templates: Arc<dyn TemplateStore>,
    campaigns: Arc<dyn CampaignStore>,
    sender: BulkSender,
    from: Address,
    /// Campaigns whose task is still running
    launched: Arc<Mutex<HashSet<CampaignId>>>,
}

impl CampaignRunner {
    /// Runner backed by a single [`MemoryStore`].
    pub fn new(store: Arc<MemoryStore>, sender: BulkSender, from: Address) -> Self {
        Self::with_stores(store.clone(), store.clone(), store, sender, from)
    }

    /// Runner with separate stores (e.g. campaigns in a [`FileCampaignStore`]).
    ///
    /// [`FileCampaignStore`]: crate::FileCampaignStore
    pub fn with_stores(
        contacts: Arc<dyn ContactStore>,
        templates: Arc<dyn TemplateStore>,
        campaigns: Arc<dyn CampaignStore>,
        sender: BulkSender,
        from: Address,
    ) -> Self {
        Self {
            contacts,
            templates,
            campaigns,
            sender,
            from,
            launched: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create and persist a `Pending` campaign.
    pub fn create_campaign(
        &self,
        name: impl Into<String>,
        list_id: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Result<Campaign, CampaignError> {
        let campaign = Campaign::new(name, list_id, template_id);
        self.campaigns.insert(&campaign)?;
        tracing::info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created");
        Ok(campaign)
    }

    /// Launch a `Pending` campaign on its own task and return immediately.
    ///
    /// Must be called from within a Tokio runtime. Progress is observed with
    /// [`get_campaign_status`](Self::get_campaign_status).
    pub fn start_campaign(&self, id: CampaignId) -> Result<CampaignHandle, CampaignError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CampaignError::Runtime(e.to_string()))?;

        let campaign = self.campaigns.get(&id)?.ok_or(CampaignError::NotFound(id))?;
        if campaign.status != CampaignStatus::Pending || !self.launched.lock().insert(id) {
            return Err(CampaignError::AlreadyStarted(id));
        }

        let job = CampaignJob {
            campaign,
            contacts: Arc::clone(&self.contacts),
            templates: Arc::clone(&self.templates),
            campaigns: Arc::clone(&self.campaigns),
            sender: self.sender.clone(),
            from: self.from.clone(),
        };
        let campaigns = Arc::clone(&self.campaigns);
        let launched = Arc::clone(&self.launched);
        let task = async move {
            let report = match AssertUnwindSafe(job.run()).catch_unwind().await {
                Ok(report) => report,
                Err(panic) => fail_after_panic(campaigns.as_ref(), id, &*panic),
            };
            launched.lock().remove(&id);
            report
        };

        tracing::info!(campaign_id = %id, "Campaign launched");
        Ok(CampaignHandle {
            id,
            join: runtime.spawn(task),
        })
    }

    /// Whether a campaign's background task is still running.
    pub fn is_running(&self, id: CampaignId) -> bool {
        self.launched.lock().contains(&id)
    }

    /// Current status snapshot of a campaign.
    pub fn get_campaign_status(&self, id: CampaignId) -> Result<CampaignProgress, CampaignError> {
        Ok(self.get_campaign(id)?.progress())
    }

    /// Full campaign record.
    pub fn get_campaign(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.campaigns.get(&id)?.ok_or(CampaignError::NotFound(id))
    }

    /// All campaigns, newest first.
    pub fn list_campaigns(&self) -> Result<Vec<Campaign>, CampaignError> {
        self.campaigns.list()
    }
}

/// Handle to a launched campaign.
#[derive(Debug)]
pub struct CampaignHandle {
    id: CampaignId,
    join: JoinHandle<SendReport>,
}

impl CampaignHandle {
    pub fn id(&self) -> CampaignId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the campaign task to finish.
    pub async fn wait(self) -> Result<SendReport, CampaignError> {
        self.join
            .await
            .map_err(|e| CampaignError::Runtime(e.to_string()))
    }
}

/// Everything one background run owns.
struct CampaignJob {
    campaign: Campaign,
    contacts: Arc<dyn ContactStore>,
    templates: Arc<dyn TemplateStore>,
    campaigns: Arc<dyn CampaignStore>,
    sender: BulkSender,
    from: Address,
}

impl CampaignJob {
    async fn run(self) -> SendReport {
        let CampaignJob {
            mut campaign,
            contacts,
            templates,
            campaigns,
            sender,
            from,
        } = self;

        let persist = move |c: &Campaign| {
            if let Err(e) = campaigns.save(c) {
                tracing::error!(campaign_id = %c.id, error = %e, "Failed to persist campaign");
            }
        };

        // Snapshot: later list edits do not affect this run.
        let contacts = match contacts.get_contacts(&campaign.list_id) {
            Ok(contacts) => contacts,
            Err(e) => {
                sender.abort(&mut campaign, e, &persist);
                return SendReport::from(&campaign);
            }
        };
        if contacts.is_empty() {
            sender.abort(&mut campaign, CampaignError::NoContacts, &persist);
            return SendReport::from(&campaign);
        }

        let template = match templates.get_template(&campaign.template_id) {
            Ok(Some(template)) => template,
            Ok(None) => {
                let err = CampaignError::TemplateNotFound(campaign.template_id.clone());
                sender.abort(&mut campaign, err, &persist);
                return SendReport::from(&campaign);
            }
            Err(e) => {
                sender.abort(&mut campaign, e, &persist);
                return SendReport::from(&campaign);
            }
        };

        sender
            .execute(&mut campaign, &contacts, &template, &from, &persist)
            .await;
        SendReport::from(&campaign)
    }
}

/// Mark a campaign whose task panicked as `Failed` so pollers see an end state.
fn fail_after_panic(
    campaigns: &dyn CampaignStore,
    id: CampaignId,
    panic: &(dyn Any + Send),
) -> SendReport {
    let reason = format!("campaign task panicked: {}", panic_message(panic));
    tracing::error!(campaign_id = %id, reason = %reason, "Campaign task panicked");

    let mut campaign = match campaigns.get(&id) {
        Ok(Some(campaign)) => campaign,
        Ok(None) => return panicked_report(reason),
        Err(e) => {
            tracing::error!(campaign_id = %id, error = %e, "Failed to load campaign");
            return panicked_report(reason);
        }
    };
    if !campaign.status.is_terminal() {
        if let Err(e) = campaign.fail(reason.clone()) {
            tracing::error!(campaign_id = %id, error = %e, "Campaign could not be marked failed");
        } else if let Err(e) = campaigns.save(&campaign) {
            tracing::error!(campaign_id = %id, error = %e, "Failed to persist campaign");
        }
    }
    SendReport::from(&campaign)
}

fn panicked_report(reason: String) -> SendReport {
    SendReport {
        status: CampaignStatus::Failed,
        total: 0,
        sent: 0,
        failed: 0,
        batches: 0,
        errors: Vec::new(),
        failure_reason: Some(reason),
    }
}
