//! Campaign runner tests: launch, poll, persist.

use mailshot::providers::LocalMailer;
use mailshot::{
    BulkSender, CampaignError, CampaignRunner, CampaignStatus, CampaignStore, Contact,
    ContactStore, FileCampaignStore, MemoryStore, SendPolicy, Template,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helper Functions
// ============================================================================

fn seeded_store(n: usize) -> Arc<MemoryStore> {
    let store = MemoryStore::shared();
    store.create_list("customers");
    for i in 1..=n {
        store
            .add_contact(
                "customers",
                Contact::new(format!("user{}@example.com", i)).name(format!("User {}", i)),
            )
            .unwrap();
    }
    store.put_template(
        "welcome",
        Template::new("welcome", "Welcome {{name}}", "<p>Hi {{name}}</p>"),
    );
    store
}

fn runner(store: Arc<MemoryStore>, mailer: &LocalMailer, policy: SendPolicy) -> CampaignRunner {
    let sender = BulkSender::new(Arc::new(mailer.clone())).with_policy(policy);
    CampaignRunner::new(store, sender, "news@acme.com".into())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn create_then_run_to_completion() {
    let mailer = LocalMailer::new();
    let runner = runner(seeded_store(3), &mailer, SendPolicy::immediate());

    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Pending);
    assert_eq!(
        runner.get_campaign_status(campaign.id).unwrap().status,
        CampaignStatus::Pending
    );

    let handle = runner.start_campaign(campaign.id).unwrap();
    assert_eq!(handle.id(), campaign.id);
    let report = handle.wait().await.unwrap();
    assert!(!runner.is_running(campaign.id));

    assert_eq!(report.status, CampaignStatus::Completed);
    assert_eq!((report.total, report.sent, report.failed), (3, 3, 0));

    let stored = runner.get_campaign(campaign.id).unwrap();
    assert_eq!(stored.status, CampaignStatus::Completed);
    assert!(stored.started_at.is_some());
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.progress().percent, 100.0);
    assert_eq!(mailer.emails()[0].email.subject, "Welcome User 1");
}

#[tokio::test(start_paused = true)]
async fn status_can_be_polled_while_running() {
    let mailer = LocalMailer::new();
    let runner = runner(
        seeded_store(3),
        &mailer,
        SendPolicy::default().email_delay(Duration::from_secs(6)),
    );
    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();

    let handle = runner.start_campaign(campaign.id).unwrap();

    // The first email goes out, then the run sleeps for 6 s.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let progress = runner.get_campaign_status(campaign.id).unwrap();
    assert_eq!(progress.status, CampaignStatus::Running);
    assert_eq!(progress.total, 3);
    assert_eq!(progress.sent, 1);
    assert!(!handle.is_finished());

    handle.wait().await.unwrap();
    let progress = runner.get_campaign_status(campaign.id).unwrap();
    assert_eq!(progress.status, CampaignStatus::Completed);
    assert_eq!(progress.sent, 3);
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let mailer = LocalMailer::new();
    let runner = runner(seeded_store(1), &mailer, SendPolicy::immediate());
    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();

    let handle = runner.start_campaign(campaign.id).unwrap();
    assert!(matches!(
        runner.start_campaign(campaign.id),
        Err(CampaignError::AlreadyStarted(id)) if id == campaign.id
    ));

    handle.wait().await.unwrap();
    assert!(matches!(
        runner.start_campaign(campaign.id),
        Err(CampaignError::AlreadyStarted(_))
    ));
    assert_eq!(mailer.email_count(), 1);
}

#[tokio::test]
async fn unknown_campaign_is_not_found() {
    let mailer = LocalMailer::new();
    let runner = runner(seeded_store(1), &mailer, SendPolicy::immediate());
    let id = uuid::Uuid::new_v4();

    assert!(matches!(
        runner.start_campaign(id),
        Err(CampaignError::NotFound(_))
    ));
    assert!(matches!(
        runner.get_campaign_status(id),
        Err(CampaignError::NotFound(_))
    ));
}

#[test]
fn start_requires_a_runtime() {
    let mailer = LocalMailer::new();
    let runner = runner(seeded_store(1), &mailer, SendPolicy::immediate());
    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();

    assert!(matches!(
        runner.start_campaign(campaign.id),
        Err(CampaignError::Runtime(_))
    ));
}

// ============================================================================
// Setup Failures
// ============================================================================

#[tokio::test]
async fn missing_template_fails_campaign() {
    let mailer = LocalMailer::new();
    let runner = runner(seeded_store(2), &mailer, SendPolicy::immediate());
    let campaign = runner
        .create_campaign("Spring", "customers", "nope")
        .unwrap();

    let report = runner
        .start_campaign(campaign.id)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.status, CampaignStatus::Failed);
    assert!(report
        .failure_reason
        .unwrap()
        .contains("Template not found: nope"));
    assert!(mailer.attempts().is_empty());
    assert_eq!(
        runner.get_campaign(campaign.id).unwrap().status,
        CampaignStatus::Failed
    );
}

#[tokio::test]
async fn empty_list_is_checked_before_template() {
    let mailer = LocalMailer::new();
    let runner = runner(MemoryStore::shared(), &mailer, SendPolicy::immediate());
    let campaign = runner
        .create_campaign("Spring", "nobody", "missing")
        .unwrap();

    let report = runner
        .start_campaign(campaign.id)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.status, CampaignStatus::Failed);
    assert!(report.failure_reason.unwrap().contains("No contacts"));
}

#[tokio::test]
async fn unreachable_transport_fails_campaign() {
    let mailer = LocalMailer::new();
    mailer.set_probe_failure("connection refused");
    let runner = runner(seeded_store(2), &mailer, SendPolicy::immediate());
    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();

    let report = runner
        .start_campaign(campaign.id)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.status, CampaignStatus::Failed);
    assert_eq!(report.sent + report.failed, 0);
    assert!(mailer.attempts().is_empty());
}

/// Contact backend that crashes on read.
struct CrashingContacts;

impl ContactStore for CrashingContacts {
    fn get_contacts(&self, _list_id: &str) -> Result<Vec<Contact>, CampaignError> {
        panic!("contact backend crashed");
    }
}

#[tokio::test]
async fn crashed_task_marks_campaign_failed() {
    let store = seeded_store(1);
    let mailer = LocalMailer::new();
    let sender = BulkSender::new(Arc::new(mailer.clone())).with_policy(SendPolicy::immediate());
    let runner = CampaignRunner::with_stores(
        Arc::new(CrashingContacts),
        store.clone(),
        store,
        sender,
        "news@acme.com".into(),
    );
    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();

    let report = runner
        .start_campaign(campaign.id)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.status, CampaignStatus::Failed);
    assert!(report
        .failure_reason
        .unwrap()
        .contains("contact backend crashed"));
    assert_eq!(
        runner.get_campaign(campaign.id).unwrap().status,
        CampaignStatus::Failed
    );
    assert!(!runner.is_running(campaign.id));
    assert!(matches!(
        runner.start_campaign(campaign.id),
        Err(CampaignError::AlreadyStarted(_))
    ));
    assert!(mailer.attempts().is_empty());
}

// ============================================================================
// Snapshot and Concurrency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn list_edits_after_start_do_not_change_total() {
    let store = seeded_store(2);
    let mailer = LocalMailer::new();
    let runner = runner(
        store.clone(),
        &mailer,
        SendPolicy::default().email_delay(Duration::from_secs(6)),
    );
    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();

    let handle = runner.start_campaign(campaign.id).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    store
        .add_contact("customers", Contact::new("late@example.com"))
        .unwrap();

    let report = handle.wait().await.unwrap();
    assert_eq!(report.total, 2);
    assert!(!mailer.sent_to("late@example.com"));
}

#[tokio::test]
async fn campaigns_run_concurrently() {
    let store = seeded_store(4);
    let mailer = LocalMailer::new();
    let runner = runner(store, &mailer, SendPolicy::immediate());

    let first = runner.create_campaign("A", "customers", "welcome").unwrap();
    let second = runner.create_campaign("B", "customers", "welcome").unwrap();
    let h1 = runner.start_campaign(first.id).unwrap();
    let h2 = runner.start_campaign(second.id).unwrap();

    let (r1, r2) = tokio::join!(h1.wait(), h2.wait());
    assert_eq!(r1.unwrap().sent, 4);
    assert_eq!(r2.unwrap().sent, 4);
    assert_eq!(mailer.email_count(), 8);

    let listed = runner.list_campaigns().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
}

// ============================================================================
// File Store
// ============================================================================

#[tokio::test]
async fn file_store_persists_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(2);
    let mailer = LocalMailer::new();
    mailer.fail_for("user2@example.com", "bounced");

    let campaigns = Arc::new(FileCampaignStore::open(dir.path()).unwrap());
    let sender = BulkSender::new(Arc::new(mailer.clone())).with_policy(SendPolicy::immediate());
    let runner = CampaignRunner::with_stores(
        store.clone(),
        store,
        campaigns,
        sender,
        "news@acme.com".into(),
    );

    let campaign = runner
        .create_campaign("Spring", "customers", "welcome")
        .unwrap();
    runner
        .start_campaign(campaign.id)
        .unwrap()
        .wait()
        .await
        .unwrap();

    // A fresh store over the same directory sees the finished record.
    let reopened = FileCampaignStore::open(dir.path()).unwrap();
    let stored = reopened.get(&campaign.id).unwrap().unwrap();
    assert_eq!(stored.status, CampaignStatus::Completed);
    assert_eq!((stored.sent, stored.failed, stored.total), (1, 1, 2));
    assert_eq!(stored.errors, vec!["failed: user2@example.com"]);
}
