//! Structured logging using the tracing crate
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE (default INFO)
//! - `LOG_FORMAT`: `json` for log aggregation, `pretty` for development,
//!   `compact` for terminals (default json)
//! - `LOG_SPANS`: `true` to emit span open/close events (default false)
//! - `RUST_LOG`: full filter override in env_logger syntax
//!
//! ```bash
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG ./teamsheet-bot run
//! ```

use std::env;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Machine-readable JSON lines
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single-line, colored
    Compact,
}

impl LogFormat {
    /// Parse log format from string; anything unknown means JSON
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Parse a `LOG_LEVEL` value; anything unknown means INFO
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Parse a `LOG_SPANS` value; only "true" (any case) enables span events
pub fn parse_span_flag(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("true")
}

fn span_events(include_spans: bool) -> FmtSpan {
    if include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn quiet(directive: &str) -> Directive {
    Directive::from_str(directive).expect("static directive")
}

/// Initialize logging with manual configuration
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let filter = match env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => EnvFilter::new(level.to_string())
            .add_directive(quiet("hyper=warn"))
            .add_directive(quiet("warp=warn"))
            .add_directive(quiet("reqwest=warn"))
            .add_directive(quiet("rustls=warn")),
    };

    let subscriber = tracing_subscriber::registry().with(filter);
    let spans = span_events(include_spans);

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_span_events(spans))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(fmt::layer().pretty().with_ansi(true).with_span_events(spans))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(
                    fmt::layer()
                        .compact()
                        .with_ansi(true)
                        .with_target(false)
                        .with_span_events(spans),
                )
                .init();
        }
    }
}

/// Initialize logging from environment variables
pub fn init_default_logging() {
    let level = parse_level(&env::var("LOG_LEVEL").unwrap_or_default());
    let format = LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default());
    let include_spans = parse_span_flag(&env::var("LOG_SPANS").unwrap_or_default());

    init_logging(level, format, include_spans);
}

/// Create a span around handling one webhook update
#[macro_export]
macro_rules! update_span {
    ($($field:tt)*) => {
        tracing::info_span!("webhook_update", $($field)*)
    };
}

/// Create a span around a spreadsheet write
#[macro_export]
macro_rules! sheet_span {
    ($($field:tt)*) => {
        tracing::info_span!("sheet_write", $($field)*)
    };
}

pub use {sheet_span, update_span};
