//! Integration tests for the Telegram Bot API client
//!
//! Tests behavioral contracts against a mock Bot API:
//! - sendMessage request shape
//! - setWebhook / deleteWebhook registration
//! - API error envelopes, unparseable bodies and network failures
//! - the bot token never appears in error text

use std::time::Duration;
use teamsheet_bot::chat::{ChatClient, ChatError, TelegramClient, TelegramConfig};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123456:test-token";

fn test_client(base_url: &str) -> TelegramClient {
    TelegramClient::new(TelegramConfig {
        bot_token: TOKEN.to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_send_message_posts_chat_id_and_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_json(serde_json::json!({
            "chat_id": -1001234567890i64,
            "text": "✅ Recorded cumulative vol 1500 for Khoa Dao."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {
                "message_id": 99,
                "chat": {"id": -1001234567890i64, "type": "supergroup"},
                "date": 1717000000,
                "text": "✅ Recorded cumulative vol 1500 for Khoa Dao."
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server.uri());
    client
        .send_message(-1001234567890, "✅ Recorded cumulative vol 1500 for Khoa Dao.")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_message_returns_api_error_from_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was kicked from the supergroup chat"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server.uri());
    let err = client.send_message(42, "hello").await.unwrap_err();

    match err {
        ChatError::ApiError(message) => {
            assert!(message.contains("403"));
            assert!(message.contains("bot was kicked"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_body_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server.uri());
    let err = client.send_message(42, "hello").await.unwrap_err();

    assert!(matches!(err, ChatError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_network_error_does_not_leak_token() {
    // nothing listens on port 1
    let client = test_client("http://127.0.0.1:1");
    let err = client.send_message(42, "hello").await.unwrap_err();

    assert!(matches!(err, ChatError::NetworkError(_)));
    assert!(!err.to_string().contains("test-token"));
}

#[tokio::test]
async fn test_get_me_and_health_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getMe")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {
                "id": 123456,
                "is_bot": true,
                "first_name": "Team KPI",
                "username": "team_kpi_bot"
            }
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server.uri());
    let me = client.get_me().await.unwrap();

    assert_eq!(me.id, 123456);
    assert!(me.is_bot);
    assert_eq!(me.username.as_deref(), Some("team_kpi_bot"));
    assert!(client.health_check().await.is_ok());
}

#[tokio::test]
async fn test_set_webhook_sends_url_and_secret() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/setWebhook")))
        .and(body_partial_json(serde_json::json!({
            "url": "https://bot.example.com/webhook",
            "secret_token": "s3cret",
            "allowed_updates": ["message"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": true,
            "description": "Webhook was set"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server.uri());
    client
        .set_webhook("https://bot.example.com/webhook", Some("s3cret"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_webhook_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/setWebhook")))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: bad webhook: HTTPS url must be provided for webhook"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server.uri());
    let err = client
        .set_webhook("http://insecure.example.com/webhook", None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("HTTPS url must be provided"));
}

#[tokio::test]
async fn test_delete_webhook() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/deleteWebhook")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": true,
            "description": "Webhook was deleted"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server.uri());
    client.delete_webhook().await.unwrap();
}
