//! Local adapter tests.

use mailshot::providers::LocalMailer;
use mailshot::{Email, MailError, Mailer};
use std::time::Duration;

fn email_to(to: &str) -> Email {
    Email::new()
        .from("news@acme.com")
        .to(to)
        .subject("Hello!")
        .text_body("Hello!")
}

#[tokio::test]
async fn deliver_returns_ok() {
    let mailer = LocalMailer::new();

    let result = mailer.deliver(&email_to("ana@example.com")).await;
    assert!(result.is_ok());
    assert!(mailer.sent_to("ana@example.com"));
}

#[tokio::test]
async fn captures_in_send_order() {
    let mailer = LocalMailer::new();
    for to in ["c@example.com", "a@example.com", "b@example.com"] {
        mailer.deliver(&email_to(to)).await.unwrap();
    }

    assert_eq!(
        mailer.recipients(),
        vec!["c@example.com", "a@example.com", "b@example.com"]
    );
}

#[tokio::test]
async fn failed_attempts_are_recorded_but_not_captured() {
    let mailer = LocalMailer::new();
    mailer.fail_for("b@example.com", "mailbox full");

    mailer.deliver(&email_to("a@example.com")).await.unwrap();
    let err = mailer.deliver(&email_to("b@example.com")).await.unwrap_err();

    assert!(matches!(err, MailError::SendError(ref m) if m == "mailbox full"));
    assert_eq!(mailer.attempts().len(), 2);
    assert_eq!(mailer.email_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stall_delays_delivery() {
    let mailer = LocalMailer::new();
    mailer.stall_for("slow@example.com", Duration::from_secs(45));

    let start = tokio::time::Instant::now();
    mailer.deliver(&email_to("slow@example.com")).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(45));
}

#[tokio::test]
async fn probe_failure_is_reported() {
    let mailer = LocalMailer::new();
    mailer.set_probe_failure("authentication failed");

    let err = mailer.probe().await.unwrap_err();
    assert!(err.to_string().contains("authentication failed"));
    // Probing must not send anything.
    assert_eq!(mailer.attempts().len(), 0);
}
