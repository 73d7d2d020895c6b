//! Telegram Bot API client
//!
//! Thin `reqwest` wrapper around the handful of Bot API methods the bot
//! uses. Calls are made once; a failed reply is reported to the caller and
//! never retried.

use crate::chat::client::{ChatClient, ChatError};
use crate::chat::types::{ApiResponse, SendMessageRequest, SetWebhookRequest, User};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Telegram client configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            base_url: "https://api.telegram.org".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Telegram Bot API client
pub struct TelegramClient {
    config: TelegramConfig,
    client: Client,
}

impl TelegramClient {
    /// Create a new Telegram client
    pub fn new(config: TelegramConfig) -> Result<Self, ChatError> {
        if config.bot_token.is_empty() {
            return Err(ChatError::NotConfigured(
                "Telegram bot token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Call a Bot API method with a JSON body and unwrap the response envelope
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, ChatError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                // the request URL embeds the bot token
                let e = e.without_url();
                warn!("Telegram {} network error: {}", method, e);
                ChatError::NetworkError(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::NetworkError(e.without_url().to_string()))?;

        let envelope: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            error!(
                "Telegram {} returned unparseable body (status {}): {}",
                method, status, e
            );
            ChatError::InvalidResponse(format!("{method}: status {status}: {e}"))
        })?;

        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| "no description".to_string());
            let code = envelope.error_code.unwrap_or(i64::from(status.as_u16()));
            error!("Telegram {} failed: {} - {}", method, code, description);
            return Err(ChatError::ApiError(format!("{method}: {code} - {description}")));
        }

        envelope
            .result
            .ok_or_else(|| ChatError::InvalidResponse(format!("{method}: missing result")))
    }

    /// Identify the bot behind the token (`getMe`)
    pub async fn get_me(&self) -> Result<User, ChatError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Register the webhook URL Telegram should post updates to
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), ChatError> {
        let request = SetWebhookRequest {
            url,
            secret_token,
            allowed_updates: vec!["message"],
            drop_pending_updates: false,
        };
        let accepted: bool = self.call("setWebhook", &request).await?;
        if !accepted {
            return Err(ChatError::ApiError("setWebhook: not accepted".to_string()));
        }
        debug!("Webhook registered at {}", url);
        Ok(())
    }

    /// Remove the webhook registration
    pub async fn delete_webhook(&self) -> Result<(), ChatError> {
        let _: bool = self.call("deleteWebhook", &serde_json::json!({})).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChatError> {
        debug!("Sending reply to chat {} ({} chars)", chat_id, text.len());
        let request = SendMessageRequest { chat_id, text };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChatError> {
        self.get_me().await.map(|_| ())
    }
}
