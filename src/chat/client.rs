//! Chat client trait and error type

use async_trait::async_trait;
use thiserror::Error;

/// Outbound chat operations used by the bot
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Client name for logs and health output (e.g. "telegram")
    fn name(&self) -> &str;

    /// Send a plain-text message to a chat
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChatError>;

    /// Check that the API accepts our credentials
    async fn health_check(&self) -> Result<(), ChatError>;
}

/// Chat client errors
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("Chat client not configured: {0}")]
    NotConfigured(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let errors = vec![
            ChatError::NotConfigured("test".to_string()),
            ChatError::NetworkError("test".to_string()),
            ChatError::ApiError("test".to_string()),
            ChatError::InvalidResponse("test".to_string()),
        ];

        for error in errors {
            let error_string = error.to_string();
            assert!(error_string.ends_with("test"));
        }
    }
}
