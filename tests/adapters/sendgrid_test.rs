//! SendGrid adapter tests.

use mailshot::providers::SendGridMailer;
use mailshot::{BulkSender, CampaignStatus, Contact, Email, MailError, Mailer, SendPolicy};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn valid_email() -> Email {
    Email::new()
        .from("news@acme.com")
        .to("ana@example.com")
        .subject("Hello, Ana!")
        .html_body("<h1>Hello</h1>")
        .text_body("Hello")
}

fn accepted_response() -> ResponseTemplate {
    ResponseTemplate::new(202).insert_header("X-Message-Id", "123-xyz")
}

async fn mount_profile(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"first_name": "Acme"})))
        .mount(server)
        .await;
}

// ============================================================================
// Delivery Tests
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_message_id() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.test-api-key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(header("Authorization", "Bearer SG.test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "from": {"email": "news@acme.com"},
            "personalizations": [{"to": [{"email": "ana@example.com"}]}],
            "content": [
                {"type": "text/plain", "value": "Hello"},
                {"type": "text/html", "value": "<h1>Hello</h1>"}
            ],
            "subject": "Hello, Ana!"
        })))
        .respond_with(accepted_response())
        .expect(1)
        .mount(&server)
        .await;

    let delivery = mailer.deliver(&valid_email()).await.unwrap();
    assert_eq!(delivery.message_id, "123-xyz");
}

#[tokio::test]
async fn delivery_sends_names_and_headers() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.test-api-key").base_url(server.uri());

    let email = Email::new()
        .from(("Acme News", "news@acme.com"))
        .to(("Ana", "ana@example.com"))
        .subject("Hi")
        .body("Plain hello")
        .header("X-Campaign-Id", "spring");

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(body_partial_json(json!({
            "from": {"email": "news@acme.com", "name": "Acme News"},
            "personalizations": [{"to": [{"email": "ana@example.com", "name": "Ana"}]}],
            "content": [{"type": "text/plain", "value": "Plain hello"}],
            "headers": {"X-Campaign-Id": "spring"}
        })))
        .respond_with(accepted_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer.deliver(&email).await.is_ok());
}

// ============================================================================
// Error Response Tests
// ============================================================================

#[tokio::test]
async fn deliver_with_429_response() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.test-api-key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "errors": [{"field": null, "message": "too many requests"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer.deliver(&valid_email()).await.unwrap_err();
    assert!(err.to_string().contains("too many requests"));
    assert!(matches!(
        err,
        MailError::ProviderError {
            status: Some(429),
            ..
        }
    ));
}

#[tokio::test]
async fn deliver_with_500_response() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.test-api-key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(500).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer.deliver(&valid_email()).await.unwrap_err();
    assert!(err.to_string().contains("Unknown error"));
}

#[tokio::test]
async fn deliver_without_from_returns_error() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.test-api-key").base_url(server.uri());

    let email = Email::new()
        .to("ana@example.com")
        .subject("Hello!")
        .text_body("Hi");

    let result = mailer.deliver(&email).await;
    assert!(result.unwrap_err().to_string().contains("from"));
}

// ============================================================================
// Probe Tests
// ============================================================================

#[tokio::test]
async fn probe_accepts_valid_key() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.test-api-key").base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("Authorization", "Bearer SG.test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"first_name": "Acme"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer.probe().await.is_ok());
}

#[tokio::test]
async fn probe_rejects_bad_key() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.revoked").base_url(server.uri());
    mount_profile(&server, 401).await;

    let err = mailer.probe().await.unwrap_err();
    assert!(matches!(err, MailError::ProbeFailed(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn probe_never_sends_mail() {
    let server = MockServer::start().await;
    let mailer = SendGridMailer::new("SG.test-api-key").base_url(server.uri());
    mount_profile(&server, 200).await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(accepted_response())
        .expect(0)
        .mount(&server)
        .await;

    mailer.probe().await.unwrap();
}

// ============================================================================
// Campaign over SendGrid
// ============================================================================

#[tokio::test]
async fn campaign_through_sendgrid_counts_rejections() {
    let server = MockServer::start().await;
    mount_profile(&server, 200).await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(body_partial_json(json!({
            "personalizations": [{"to": [{"email": "b@example.com"}]}]
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"message": "does not contain a valid address"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(accepted_response())
        .expect(2)
        .mount(&server)
        .await;

    let mailer = Arc::new(SendGridMailer::new("SG.test-api-key").base_url(server.uri()));
    let sender = BulkSender::new(mailer).with_policy(SendPolicy::immediate());
    let contacts = vec![
        Contact::new("a@example.com").name("Ana"),
        Contact::new("b@example.com"),
        Contact::new("c@example.com").name("Cleo"),
    ];

    let report = sender
        .run_campaign(&contacts, "Hi {{name}}", "<p>Hello {{name}}</p>", &"news@acme.com".into())
        .await;

    assert_eq!(report.status, CampaignStatus::Completed);
    assert_eq!((report.sent, report.failed, report.total), (2, 1, 3));
    assert_eq!(report.errors, vec!["failed: b@example.com"]);
}

#[tokio::test]
async fn campaign_fails_when_key_rejected() {
    let server = MockServer::start().await;
    mount_profile(&server, 403).await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(accepted_response())
        .expect(0)
        .mount(&server)
        .await;

    let mailer = Arc::new(SendGridMailer::new("SG.test-api-key").base_url(server.uri()));
    let sender = BulkSender::new(mailer).with_policy(SendPolicy::immediate());

    let report = sender
        .run_campaign(
            &[Contact::new("a@example.com")],
            "Hi",
            "Hello",
            &"news@acme.com".into(),
        )
        .await;

    assert_eq!(report.status, CampaignStatus::Failed);
    assert_eq!(report.sent + report.failed, 0);
    assert!(report.failure_reason.unwrap().contains("Transport unavailable"));
}
