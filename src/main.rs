//! teamsheet-bot - Main Entry Point

use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use teamsheet_bot::chat::{ChatClient, TelegramClient, TelegramConfig};
use teamsheet_bot::config::BotConfig;
use teamsheet_bot::error::{BotError, BotResult};
use teamsheet_bot::health::HealthCheckManager;
use teamsheet_bot::observability::init_default_logging;
use teamsheet_bot::processor::MessageProcessor;
use teamsheet_bot::server::WebhookServer;
use teamsheet_bot::sheets::{
    GoogleSheetsClient, GoogleSheetsConfig, ServiceAccountKey, SheetClient, TokenProvider,
};
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["bot.toml", "config/bot.toml"];

/// Telegram bot that records team figures into a Google Sheet
#[derive(Parser)]
#[command(name = "teamsheet-bot")]
#[command(about = "Record /vol and /user reports from Telegram into a Google Sheet")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "TEAMSHEET_BOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the webhook
    Run,
    /// Validate configuration
    Config {
        /// Print the parsed configuration
        #[arg(long)]
        show: bool,
    },
    /// Register the webhook URL with Telegram
    SetWebhook {
        /// Public URL to register (defaults to server.public_url + webhook path)
        #[arg(long)]
        url: Option<String>,
    },
    /// Remove the webhook registration
    DeleteWebhook,
    /// Check Telegram and spreadsheet access
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting teamsheet-bot v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::SetWebhook { url } => set_webhook(&config, url).await,
        Commands::DeleteWebhook => delete_webhook(&config).await,
        Commands::Check => check(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(config_path: Option<&Path>) -> BotResult<BotConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(BotConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(BotConfig::load_from_file(path)?);
        }
    }

    Err(BotError::internal(
        "No configuration file found. Provide one with -c/--config or create bot.toml",
    ))
}

fn build_telegram_client(config: &BotConfig) -> BotResult<TelegramClient> {
    let telegram_config = TelegramConfig {
        bot_token: config.get_bot_token()?,
        base_url: config.bot.api_base_url.clone(),
        timeout: Duration::from_secs(config.bot.request_timeout_secs),
    };
    Ok(TelegramClient::new(telegram_config)?)
}

fn build_sheet_client(config: &BotConfig) -> BotResult<GoogleSheetsClient> {
    let timeout = Duration::from_secs(config.bot.request_timeout_secs);
    let key = ServiceAccountKey::load(&config.sheets.credentials_path)?;
    info!("Using service account {}", key.client_email);

    let http = GoogleSheetsClient::http_client(timeout)?;
    let tokens = Arc::new(TokenProvider::new(key, http.clone())?);

    let mut sheets_config =
        GoogleSheetsConfig::new(config.resolve_spreadsheet()?, config.sheets.worksheet.clone());
    sheets_config.sheets_base_url = config.sheets.sheets_base_url.clone();
    sheets_config.drive_base_url = config.sheets.drive_base_url.clone();
    sheets_config.timeout = timeout;

    Ok(GoogleSheetsClient::new(sheets_config, http, tokens))
}

async fn run_bot(config: BotConfig) -> BotResult<()> {
    info!(
        "Bot {} serving {} roster members into worksheet '{}'",
        config.bot.id,
        config.members.len(),
        config.sheets.worksheet
    );

    let chat: Arc<dyn ChatClient> = Arc::new(build_telegram_client(&config)?);
    let sheets: Arc<dyn SheetClient> = Arc::new(build_sheet_client(&config)?);

    if config.get_webhook_secret().is_none() {
        warn!("No webhook secret configured; any caller can post updates");
    }

    let processor = MessageProcessor::from_config(&config, chat.clone(), sheets.clone());
    let health = HealthCheckManager::for_clients(chat, sheets);
    let server = WebhookServer::from_config(&config, processor, health)?;

    server.run_until(shutdown_signal()).await
}

fn handle_config_command(config: &BotConfig, show: bool) -> BotResult<()> {
    if show {
        let rendered = toml::to_string_pretty(config)
            .map_err(|e| BotError::internal(format!("failed to render configuration: {e}")))?;
        println!("Current configuration:");
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}

async fn set_webhook(config: &BotConfig, url: Option<String>) -> BotResult<()> {
    let url = url.or_else(|| config.webhook_url()).ok_or_else(|| {
        BotError::internal("No webhook URL: pass --url or set server.public_url")
    })?;

    let client = build_telegram_client(config)?;
    let secret = config.get_webhook_secret();
    client.set_webhook(&url, secret.as_deref()).await?;

    info!(
        "Webhook registered at {} ({})",
        url,
        if secret.is_some() {
            "with secret token"
        } else {
            "without secret token"
        }
    );
    Ok(())
}

async fn delete_webhook(config: &BotConfig) -> BotResult<()> {
    let client = build_telegram_client(config)?;
    client.delete_webhook().await?;
    info!("Webhook removed");
    Ok(())
}

async fn check(config: &BotConfig) -> BotResult<()> {
    let chat: Arc<dyn ChatClient> = Arc::new(build_telegram_client(config)?);
    let sheets: Arc<dyn SheetClient> = Arc::new(build_sheet_client(config)?);
    let manager = HealthCheckManager::for_clients(chat, sheets);

    let results = manager.run_health_checks().await;
    for result in &results {
        println!(
            "{:<12} {:<9} {}",
            result.component,
            if result.healthy { "ok" } else { "FAILED" },
            result.message.as_deref().unwrap_or("")
        );
    }

    if HealthCheckManager::overall_health(&results) {
        Ok(())
    } else {
        Err(BotError::internal("one or more components are unhealthy"))
    }
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let sigterm = async {
        match signal::unix::signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    };

    tokio::select! {
        _ = signal_or_pending("SIGINT", signal::ctrl_c()) => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = signal_or_pending("SIGTERM", sigterm) => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Waits for a signal listener; a listener that cannot be set up never resolves
async fn signal_or_pending<F>(name: &str, listener: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = listener.await {
        error!("Failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}
