//! Bulk send orchestrator.
//!
//! Drives one campaign: probe the transport, snapshot the contact count, then
//! walk the contacts batch by batch, one send at a time, pausing between
//! emails and between batches. Per-recipient problems (bad address, provider
//! rejection, timeout, even a panicking transport) are counted and the loop
//! moves on; only setup problems fail the campaign.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::address::Address;
use crate::campaign::{Campaign, SendOutcome, SendReport};
use crate::contact::Contact;
use crate::email::Email;
use crate::error::{CampaignError, MailError};
use crate::mailer::Mailer;
use crate::pacing::{Pacer, Pause, SendPolicy, TokioPacer};
use crate::template::Template;

/// Callback receiving every campaign snapshot the orchestrator produces.
pub(crate) type OnUpdate<'a> = &'a (dyn Fn(&Campaign) + Send + Sync);

/// Sends one template to a list of contacts through a [`Mailer`].
///
/// ```ignore
/// use std::sync::Arc;
/// use mailshot::{BulkSender, Contact, SendPolicy};
/// use mailshot::providers::SendGridMailer;
///
/// let sender = BulkSender::new(Arc::new(SendGridMailer::new("SG.xxxxx")))
///     .with_policy(SendPolicy::from_env());
///
/// let contacts = vec![Contact::new("ana@example.com").name("Ana")];
/// let report = sender
///     .run_campaign(&contacts, "Hello {{name}}", "<p>Hi {{name}}</p>", &"news@acme.com".into())
///     .await;
/// println!("{}/{} sent", report.sent, report.total);
/// ```
#[derive(Clone)]
pub struct BulkSender {
    mailer: Arc<dyn Mailer>,
    pacer: Arc<dyn Pacer>,
    policy: SendPolicy,
}

impl BulkSender {
    /// Sender with the default policy, pacing on the tokio timer.
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            pacer: Arc::new(TokioPacer),
            policy: SendPolicy::default(),
        }
    }

    /// Replace the send policy.
    pub fn with_policy(mut self, policy: SendPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the pacer.
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn policy(&self) -> &SendPolicy {
        &self.policy
    }

    pub fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.mailer
    }

    /// Send `template_body` with `subject` to every contact, in order.
    ///
    /// Placeholders in both subject and body are rendered per contact. An
    /// empty contact list or a failed probe yields a `Failed` report without
    /// any delivery attempt; otherwise the report is `Completed` with
    /// `sent + failed == total`.
    pub async fn run_campaign(
        &self,
        contacts: &[Contact],
        subject: &str,
        template_body: &str,
        from: &Address,
    ) -> SendReport {
        let mut campaign = Campaign::new("ad-hoc", "", "");
        let template = Template::new("ad-hoc", subject, template_body);
        self.execute(&mut campaign, contacts, &template, from, &|_: &Campaign| {})
            .await;
        SendReport::from(&campaign)
    }

    /// Run a stored campaign, reporting each state change through `on_update`.
    pub(crate) async fn execute(
        &self,
        campaign: &mut Campaign,
        contacts: &[Contact],
        template: &Template,
        from: &Address,
        on_update: OnUpdate<'_>,
    ) {
        let span = tracing::info_span!(
            "mailshot.campaign",
            campaign_id = %campaign.id,
            provider = self.mailer.provider_name(),
            total = contacts.len(),
        );
        self.execute_inner(campaign, contacts, template, from, on_update)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        campaign: &mut Campaign,
        contacts: &[Contact],
        template: &Template,
        from: &Address,
        on_update: OnUpdate<'_>,
    ) {
        if contacts.is_empty() {
            self.abort(campaign, CampaignError::NoContacts, on_update);
            return;
        }

        if let Err(e) = self.probe().await {
            self.abort(
                campaign,
                CampaignError::TransportUnavailable(e.to_string()),
                on_update,
            );
            return;
        }

        if let Err(e) = campaign.start(contacts.len()) {
            tracing::error!(error = %e, "Campaign could not start");
            return;
        }
        on_update(campaign);

        let batches = self.policy.batches(contacts.len());
        tracing::info!(batches = batches.len(), "Campaign started");

        for (n, range) in batches.iter().enumerate() {
            if n > 0 {
                let delay = self.policy.effective_batch_delay();
                tracing::info!(delay_secs = delay.as_secs(), "Pausing before next batch");
                self.pacer.pause(Pause::BetweenBatches, delay).await;
            }
            tracing::debug!(batch = n + 1, size = range.len(), "Sending batch");
            campaign.begin_batch();

            let mut attempted = false;
            for contact in &contacts[range.clone()] {
                let outcome = if !contact.is_valid() {
                    SendOutcome::Failed(format!("invalid email address '{}'", contact.email))
                } else {
                    if attempted {
                        self.pacer
                            .pause(Pause::BetweenEmails, self.policy.email_delay)
                            .await;
                    }
                    attempted = true;
                    self.send_one(campaign, contact, template, from).await
                };

                match &outcome {
                    SendOutcome::Sent => tracing::debug!(to = %contact.email, "Email sent"),
                    SendOutcome::Failed(reason) => {
                        tracing::warn!(to = %contact.email, reason = %reason, "Email failed")
                    }
                }

                if let Err(e) =
                    campaign.record(&contact.email, &outcome, self.policy.max_error_notes)
                {
                    tracing::error!(error = %e, "Outcome not recorded");
                }
                on_update(campaign);
            }
        }

        if let Err(e) = campaign.complete() {
            tracing::error!(error = %e, "Campaign could not complete");
            return;
        }
        on_update(campaign);

        #[cfg(feature = "metrics")]
        metrics::counter!("mailshot_campaigns_total", "status" => "completed").increment(1);

        tracing::info!(
            sent = campaign.sent,
            failed = campaign.failed,
            "Campaign completed"
        );
    }

    /// Mark a campaign that could not run as `Failed`.
    pub(crate) fn abort(
        &self,
        campaign: &mut Campaign,
        reason: CampaignError,
        on_update: OnUpdate<'_>,
    ) {
        tracing::error!(
            campaign_id = %campaign.id,
            reason = %reason,
            "Campaign failed during setup"
        );
        match campaign.fail(reason.to_string()) {
            Ok(()) => on_update(campaign),
            Err(e) => tracing::error!(error = %e, "Campaign could not be marked failed"),
        }

        #[cfg(feature = "metrics")]
        metrics::counter!("mailshot_campaigns_total", "status" => "failed").increment(1);
    }

    async fn probe(&self) -> Result<(), MailError> {
        match tokio::time::timeout(self.policy.send_timeout, self.mailer.probe()).await {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(self.policy.send_timeout)),
        }
    }

    async fn send_one(
        &self,
        campaign: &Campaign,
        contact: &Contact,
        template: &Template,
        from: &Address,
    ) -> SendOutcome {
        let (subject, body) = template.render_for(contact, &self.policy.default_name);
        let email = Email::new()
            .from(from.clone())
            .to(contact.address())
            .subject(subject)
            .body(body)
            .header("X-Campaign-Id", campaign.id.to_string());

        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let delivery = AssertUnwindSafe(self.mailer.deliver(&email)).catch_unwind();
        let outcome = match tokio::time::timeout(self.policy.send_timeout, delivery).await {
            Ok(Ok(Ok(result))) => {
                tracing::trace!(
                    message_id = %result.message_id,
                    to = ?email.recipients(),
                    "Delivered"
                );
                SendOutcome::Sent
            }
            Ok(Ok(Err(e))) => SendOutcome::Failed(e.to_string()),
            Ok(Err(panic)) => {
                SendOutcome::Failed(format!("transport panicked: {}", panic_message(&*panic)))
            }
            Err(_) => SendOutcome::Failed(MailError::Timeout(self.policy.send_timeout).to_string()),
        };

        #[cfg(feature = "metrics")]
        {
            let provider = self.mailer.provider_name();
            let status = match outcome {
                SendOutcome::Sent => "success",
                SendOutcome::Failed(_) => "error",
            };
            metrics::counter!("mailshot_emails_total", "provider" => provider, "status" => status)
                .increment(1);
            metrics::histogram!("mailshot_delivery_duration_seconds", "provider" => provider)
                .record(start.elapsed().as_secs_f64());
        }

        outcome
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
