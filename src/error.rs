//! Error types for the bot
//!
//! Each subsystem has its own error enum; `BotError` unifies them for code
//! that crosses subsystem boundaries. Text shown to chat users goes through
//! `sanitize_error_message` so credentials never leak into a reply.

use crate::chat::ChatError;
use crate::command::CommandError;
use crate::config::ConfigError;
use crate::sheets::SheetError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for bot operations
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Server error: {message}")]
    Server { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    /// Short, sanitized text suitable for a chat reply
    pub fn user_message(&self) -> String {
        let message = match self {
            BotError::Command(e) => e.to_string(),
            BotError::Sheet(SheetError::SpreadsheetNotFound(name)) => {
                format!("spreadsheet '{name}' not found")
            }
            BotError::Sheet(SheetError::WorksheetNotFound(name)) => {
                format!("worksheet '{name}' not found")
            }
            BotError::Sheet(SheetError::AuthFailed(_) | SheetError::Credentials(_)) => {
                "spreadsheet access denied".to_string()
            }
            BotError::Sheet(e) => format!("spreadsheet update failed ({e})"),
            other => other.to_string(),
        };
        sanitize_error_message(&message)
    }

    /// Create server error
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret|bearer)[=:]\s*\S+").expect("valid regex")
});

static BOT_TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{6,}:[A-Za-z0-9_-]{30,}").expect("valid regex"));

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid regex")
});

static PRIVATE_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)-----BEGIN [A-Z ]*PRIVATE KEY-----.*?-----END [A-Z ]*PRIVATE KEY-----")
        .expect("valid regex")
});

const MAX_MESSAGE_LEN: usize = 500;

/// Redact secrets and cap length before text leaves the process
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = PRIVATE_KEY_PATTERN
        .replace_all(message, "***PRIVATE KEY***")
        .to_string();

    sanitized = BOT_TOKEN_PATTERN
        .replace_all(&sanitized, "***BOT TOKEN***")
        .to_string();

    sanitized = SECRET_PATTERN
        .replace_all(&sanitized, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for bot operations
pub type BotResult<T> = Result<T, BotError>;
