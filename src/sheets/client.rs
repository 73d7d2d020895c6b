//! Spreadsheet client trait and error type

use crate::layout::CellAddress;
use async_trait::async_trait;
use thiserror::Error;

/// Spreadsheet operations used by the bot
#[async_trait]
pub trait SheetClient: Send + Sync {
    /// Client name for logs and health output (e.g. "google_sheets")
    fn name(&self) -> &str;

    /// Worksheet (tab) the client writes to
    fn worksheet(&self) -> &str;

    /// Overwrite a single cell on the worksheet
    async fn update_cell(
        &self,
        cell: &CellAddress,
        value: &serde_json::Value,
    ) -> Result<(), SheetError>;

    /// Check credentials and that the target worksheet exists
    async fn health_check(&self) -> Result<(), SheetError>;
}

/// Spreadsheet client errors
#[derive(Debug, Clone, Error)]
pub enum SheetError {
    #[error("Invalid credentials: {0}")]
    Credentials(String),
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),
    #[error("Worksheet not found: {0}")]
    WorksheetNotFound(String),
}
