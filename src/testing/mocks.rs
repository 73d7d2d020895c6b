//! Mock implementations for testing
//!
//! Recording chat and sheet clients so the processor and server can be
//! exercised without Telegram or Google.

use crate::chat::{ChatClient, ChatError};
use crate::layout::CellAddress;
use crate::sheets::{SheetClient, SheetError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub type SentMessage = (i64, String);
pub type CellWrite = (CellAddress, Value);

/// Mock chat client that records every message it is asked to send
#[derive(Debug, Default)]
pub struct MockChatClient {
    pub sent_messages: Arc<Mutex<Vec<SentMessage>>>,
    pub should_fail: bool,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn get_sent_messages(&self) -> Vec<SentMessage> {
        self.sent_messages.lock().await.clone()
    }

    /// Text of the most recent message, if any
    pub async fn last_message(&self) -> Option<String> {
        self.sent_messages
            .lock()
            .await
            .last()
            .map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    fn name(&self) -> &str {
        "mock_chat"
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChatError> {
        if self.should_fail {
            return Err(ChatError::NetworkError("Mock send failure".to_string()));
        }

        self.sent_messages
            .lock()
            .await
            .push((chat_id, text.to_string()));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChatError> {
        if self.should_fail {
            Err(ChatError::ApiError("Mock health check failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Mock sheet client that records cell writes
#[derive(Debug)]
pub struct MockSheetClient {
    pub writes: Arc<Mutex<Vec<CellWrite>>>,
    pub worksheet: String,
    pub failure: Option<SheetError>,
    pub write_delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSheetClient {
    pub fn new() -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            worksheet: "vol_t7".to_string(),
            failure: None,
            write_delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every write takes `delay` to complete
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            write_delay: Some(delay),
            ..Self::new()
        }
    }

    /// Every call fails with the given error
    pub fn with_error(error: SheetError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    pub fn with_failure() -> Self {
        Self::with_error(SheetError::ApiError {
            status: 500,
            message: "Mock write failure".to_string(),
        })
    }

    pub async fn get_writes(&self) -> Vec<CellWrite> {
        self.writes.lock().await.clone()
    }

    /// Highest number of writes that were in progress at the same time
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockSheetClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SheetClient for MockSheetClient {
    fn name(&self) -> &str {
        "mock_sheets"
    }

    fn worksheet(&self) -> &str {
        &self.worksheet
    }

    async fn update_cell(&self, cell: &CellAddress, value: &Value) -> Result<(), SheetError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.writes.lock().await.push((*cell, value.clone()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SheetError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
