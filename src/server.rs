//! Webhook HTTP server
//!
//! Routes:
//!
//! - `POST /<webhook_path>` receives Telegram updates
//! - `GET /` answers `Bot is running!`
//! - `GET /health` aggregates component health checks (200 or 503)
//! - `GET /live` liveness check
//! - `GET /metrics` metrics snapshot
//!
//! The webhook always answers `200 OK` once the secret header (if any) has
//! been accepted, even for payloads it cannot parse, so Telegram does not
//! keep redelivering them.

use crate::chat::Update;
use crate::config::BotConfig;
use crate::error::{BotError, BotResult};
use crate::health::{HealthCheckManager, HealthCheckResult};
use crate::observability::metrics::metrics;
use crate::processor::MessageProcessor;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::Filter;

/// Header Telegram sets when a webhook secret was registered
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Largest update body accepted
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Shared state behind the routes
pub struct ServerState {
    bot_id: String,
    webhook_path: String,
    webhook_secret: Option<String>,
    // one update at a time
    processor: Mutex<MessageProcessor>,
    health: HealthCheckManager,
}

impl ServerState {
    pub fn new(
        bot_id: impl Into<String>,
        webhook_path: impl Into<String>,
        webhook_secret: Option<String>,
        processor: MessageProcessor,
        health: HealthCheckManager,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            webhook_path: webhook_path.into(),
            webhook_secret,
            processor: Mutex::new(processor),
            health,
        }
    }

    fn secret_accepted(&self, provided: Option<&str>) -> bool {
        match &self.webhook_secret {
            Some(expected) => provided == Some(expected.as_str()),
            None => true,
        }
    }
}

/// Build all routes over the shared state
pub fn routes(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_state = {
        let state = state.clone();
        warp::any().map(move || state.clone())
    };

    // path before method: unknown paths answer 404, not 405
    let webhook_route = warp::path(state.webhook_path.clone())
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>(SECRET_TOKEN_HEADER))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state.clone())
        .and_then(handle_webhook);

    let root_route = warp::path::end()
        .and(warp::get())
        .map(|| "Bot is running!");

    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state)
        .and_then(handle_health);

    let live_route = warp::path("live")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&LivenessResponse {
                alive: true,
                timestamp: current_timestamp(),
            })
        });

    let metrics_route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&metrics().get_metrics()));

    webhook_route
        .or(root_route)
        .or(health_route)
        .or(live_route)
        .or(metrics_route)
        .with(warp::trace::request())
}

async fn handle_webhook(
    secret: Option<String>,
    body: Bytes,
    state: Arc<ServerState>,
) -> Result<warp::reply::WithStatus<&'static str>, Infallible> {
    if !state.secret_accepted(secret.as_deref()) {
        warn!("Rejected webhook call with missing or wrong secret token");
        return Ok(warp::reply::with_status(
            "Unauthorized",
            StatusCode::UNAUTHORIZED,
        ));
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Discarding malformed update ({} bytes): {}", body.len(), e);
            metrics().update_malformed();
            return Ok(warp::reply::with_status("OK", StatusCode::OK));
        }
    };

    metrics().update_received();
    debug!("Received update {}", update.update_id);

    let processor = state.processor.lock().await;
    let outcome = processor.process_update(&update).await;
    debug!("Update {} finished: {:?}", update.update_id, outcome);

    Ok(warp::reply::with_status("OK", StatusCode::OK))
}

async fn handle_health(
    state: Arc<ServerState>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let checks = state.health.run_health_checks().await;
    let healthy = HealthCheckManager::overall_health(&checks);

    let status = HealthStatus {
        status: if healthy { "healthy" } else { "degraded" },
        timestamp: current_timestamp(),
        bot_id: state.bot_id.clone(),
        uptime_seconds: metrics().get_metrics().uptime_seconds,
        checks,
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok(warp::reply::with_status(warp::reply::json(&status), code))
}

/// HTTP server wrapping the routes
pub struct WebhookServer {
    state: Arc<ServerState>,
    addr: SocketAddr,
}

impl WebhookServer {
    pub fn new(state: ServerState, addr: SocketAddr) -> Self {
        Self {
            state: Arc::new(state),
            addr,
        }
    }

    /// Server bound to `server.host` and the effective port
    pub fn from_config(
        config: &BotConfig,
        processor: MessageProcessor,
        health: HealthCheckManager,
    ) -> BotResult<Self> {
        let host: IpAddr = config.server.host.parse().map_err(|e| {
            BotError::server(format!("invalid server.host '{}': {e}", config.server.host))
        })?;

        let state = ServerState::new(
            config.bot.id.clone(),
            config.server.webhook_path.clone(),
            config.get_webhook_secret(),
            processor,
            health,
        );

        Ok(Self::new(
            state,
            SocketAddr::new(host, config.effective_port()),
        ))
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run_until<F>(self, shutdown: F) -> BotResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (addr, server) = warp::serve(routes(self.state.clone()))
            .try_bind_with_graceful_shutdown(self.addr, shutdown)
            .map_err(|e| BotError::server(format!("failed to bind {}: {e}", self.addr)))?;

        info!(
            "Listening on {} (webhook path /{}, secret {})",
            addr,
            self.state.webhook_path,
            if self.state.webhook_secret.is_some() {
                "required"
            } else {
                "not configured"
            }
        );

        server.await;
        info!("Server stopped");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: u64,
    bot_id: String,
    uptime_seconds: u64,
    checks: Vec<HealthCheckResult>,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
