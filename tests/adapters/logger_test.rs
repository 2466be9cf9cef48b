//! Logger adapter tests.

use mailshot::providers::LoggerMailer;
use mailshot::{BulkSender, CampaignStatus, Contact, Email, Mailer, SendPolicy};
use std::sync::Arc;

#[tokio::test]
async fn deliver_returns_ok() {
    let mailer = LoggerMailer::new();

    let email = Email::new()
        .from("news@acme.com")
        .to("ana@example.com")
        .subject("Hello, Ana!")
        .text_body("Hello!");

    let delivery = mailer.deliver(&email).await.unwrap();
    assert!(!delivery.message_id.is_empty());
}

#[tokio::test]
async fn deliver_with_full_logging_returns_ok() {
    let mailer = LoggerMailer::full();

    let email = Email::new()
        .from(("Acme News", "news@acme.com"))
        .to(("Ana", "ana@example.com"))
        .subject("Hello, Ana!")
        .html_body("<h1>Hello!</h1>")
        .text_body("Hello!")
        .header("X-Campaign-Id", "spring");

    let delivery = mailer.deliver(&email).await.unwrap();
    assert!(!delivery.message_id.is_empty());
}

#[tokio::test]
async fn probe_always_succeeds() {
    assert!(LoggerMailer::new().probe().await.is_ok());
}

#[tokio::test]
async fn message_ids_are_unique() {
    let mailer = LoggerMailer::new();
    let email = Email::new().from("a@b.com").to("c@d.com").subject("Test");

    let first = mailer.deliver(&email).await.unwrap();
    let second = mailer.deliver(&email).await.unwrap();
    assert_ne!(first.message_id, second.message_id);
}

#[tokio::test]
async fn dry_run_campaign_logs_every_contact() {
    let mailer = Arc::new(LoggerMailer::full());
    let sender = BulkSender::new(mailer.clone()).with_policy(SendPolicy::immediate());
    let contacts = vec![
        Contact::new("ana@example.com").name("Ana"),
        Contact::new("luis@example.com"),
    ];

    let report = sender
        .run_campaign(&contacts, "Hi {{name}}", "<p>Hello {{name}}</p>", &"news@acme.com".into())
        .await;

    assert_eq!(report.status, CampaignStatus::Completed);
    assert_eq!(report.sent, 2);
    assert_eq!(mailer.logged(), 2);
}
