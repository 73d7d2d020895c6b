//! Component health checks
//!
//! Each outbound dependency (chat API, spreadsheet API) gets a `HealthCheck`
//! implementation; `HealthCheckManager` runs them for `/health` and for the
//! `check` CLI command.

use crate::chat::ChatClient;
use crate::error::sanitize_error_message;
use crate::sheets::SheetClient;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Health check result
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub component: String,
    pub healthy: bool,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

/// Trait for components that can be health checked
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Perform health check on this component
    async fn health_check(&self) -> HealthCheckResult;

    /// Get the component name for reporting
    fn component_name(&self) -> &str;
}

fn timed_result<E: std::fmt::Display>(
    component: &str,
    client_name: &str,
    started: Instant,
    outcome: Result<(), E>,
) -> HealthCheckResult {
    let response_time_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => {
            debug!(
                "{} health check: healthy=true, client={}, response_time={}ms",
                component, client_name, response_time_ms
            );
            HealthCheckResult {
                component: component.to_string(),
                healthy: true,
                message: Some(format!("{client_name} reachable")),
                response_time_ms: Some(response_time_ms),
            }
        }
        Err(e) => {
            warn!(
                "{} health check failed: client={}, error={}, response_time={}ms",
                component, client_name, e, response_time_ms
            );
            HealthCheckResult {
                component: component.to_string(),
                healthy: false,
                message: Some(sanitize_error_message(&format!("{client_name} error: {e}"))),
                response_time_ms: Some(response_time_ms),
            }
        }
    }
}

/// Chat API health check (`getMe` for Telegram)
pub struct ChatClientHealthCheck {
    client: Arc<dyn ChatClient>,
}

impl ChatClientHealthCheck {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthCheck for ChatClientHealthCheck {
    async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let outcome = self.client.health_check().await;
        timed_result(self.component_name(), self.client.name(), started, outcome)
    }

    fn component_name(&self) -> &str {
        "chat_api"
    }
}

/// Spreadsheet health check: credentials work and the worksheet exists
pub struct SheetClientHealthCheck {
    client: Arc<dyn SheetClient>,
}

impl SheetClientHealthCheck {
    pub fn new(client: Arc<dyn SheetClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthCheck for SheetClientHealthCheck {
    async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let outcome = self.client.health_check().await;
        timed_result(self.component_name(), self.client.name(), started, outcome)
    }

    fn component_name(&self) -> &str {
        "spreadsheet"
    }
}

/// Aggregated health check manager
pub struct HealthCheckManager {
    health_checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthCheckManager {
    pub fn new() -> Self {
        Self {
            health_checks: Vec::new(),
        }
    }

    /// Manager with checks for both outbound clients
    pub fn for_clients(chat: Arc<dyn ChatClient>, sheets: Arc<dyn SheetClient>) -> Self {
        let mut manager = Self::new();
        manager.add_health_check(Box::new(ChatClientHealthCheck::new(chat)));
        manager.add_health_check(Box::new(SheetClientHealthCheck::new(sheets)));
        manager
    }

    /// Add a health check to the manager
    pub fn add_health_check(&mut self, health_check: Box<dyn HealthCheck>) {
        self.health_checks.push(health_check);
    }

    /// Run all health checks and return their results
    pub async fn run_health_checks(&self) -> Vec<HealthCheckResult> {
        let mut results = Vec::with_capacity(self.health_checks.len());

        for health_check in &self.health_checks {
            results.push(health_check.health_check().await);
        }

        results
    }

    /// All components must be healthy; no checks at all counts as healthy
    pub fn overall_health(results: &[HealthCheckResult]) -> bool {
        if results.is_empty() {
            warn!("No health checks configured - assuming healthy");
            return true;
        }

        let healthy_count = results.iter().filter(|r| r.healthy).count();
        debug!(
            "Overall health check: {}/{} components healthy",
            healthy_count,
            results.len()
        );

        healthy_count == results.len()
    }
}

impl Default for HealthCheckManager {
    fn default() -> Self {
        Self::new()
    }
}
