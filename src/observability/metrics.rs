//! Thread-safe metrics collection
//!
//! Atomic counters for webhook traffic, command outcomes, replies and
//! spreadsheet writes, plus a bounded window of processing times. Exposed
//! as JSON on `/metrics`.

use crate::command::Metric;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

const MAX_PROCESSING_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and a mutex-guarded window
pub struct MetricsCollector {
    // Webhook traffic
    updates_received: AtomicU64,
    updates_malformed: AtomicU64,
    updates_ignored: AtomicU64,
    updates_unauthorized: AtomicU64,

    // Command outcomes
    volume_recorded: AtomicU64,
    new_users_recorded: AtomicU64,
    commands_failed: AtomicU64,

    // Outbound calls
    replies_sent: AtomicU64,
    reply_failures: AtomicU64,
    sheet_writes: AtomicU64,
    sheet_write_failures: AtomicU64,

    processing_times: Mutex<Vec<u64>>, // in milliseconds
    last_update_processed: AtomicU64,
    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            updates_received: AtomicU64::new(0),
            updates_malformed: AtomicU64::new(0),
            updates_ignored: AtomicU64::new(0),
            updates_unauthorized: AtomicU64::new(0),
            volume_recorded: AtomicU64::new(0),
            new_users_recorded: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
            reply_failures: AtomicU64::new(0),
            sheet_writes: AtomicU64::new(0),
            sheet_write_failures: AtomicU64::new(0),
            processing_times: Mutex::new(Vec::new()),
            last_update_processed: AtomicU64::new(0),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    // Webhook traffic
    pub fn update_received(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_malformed(&self) {
        self.updates_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_ignored(&self) {
        self.updates_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_unauthorized(&self) {
        self.updates_unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    // Command outcomes
    pub fn command_recorded(&self, metric: Metric, duration: Duration) {
        match metric {
            Metric::Volume => self.volume_recorded.fetch_add(1, Ordering::Relaxed),
            Metric::NewUsers => self.new_users_recorded.fetch_add(1, Ordering::Relaxed),
        };
        self.record_processing_time(duration);
    }

    pub fn command_failed(&self, duration: Duration) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
        self.record_processing_time(duration);
    }

    // Outbound calls
    pub fn reply_sent(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_failed(&self) {
        self.reply_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sheet_write(&self, success: bool) {
        self.sheet_writes.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.sheet_write_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Seconds-since-epoch of the last update that reached a command
    pub fn last_update_processed(&self) -> u64 {
        self.last_update_processed.load(Ordering::Relaxed)
    }

    fn record_processing_time(&self, duration: Duration) {
        self.last_update_processed
            .store(current_timestamp(), Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.lock() {
            times.push(duration.as_millis() as u64);

            if times.len() > MAX_PROCESSING_SAMPLES {
                times.remove(0);
            }
        }
    }

    /// Calculate processing time statistics (pure function)
    fn calculate_processing_time_statistics(&self) -> (f64, f64, f64) {
        let Ok(times) = self.processing_times.lock() else {
            return (0.0, 0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut sorted_times = times.clone();
        sorted_times.sort_unstable();

        let avg = sorted_times.iter().sum::<u64>() as f64 / sorted_times.len() as f64;
        (
            avg,
            percentile(&sorted_times, 50.0),
            percentile(&sorted_times, 95.0),
        )
    }

    /// Get a point-in-time copy of all metrics
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_processing_time_ms, p50_processing_time_ms, p95_processing_time_ms) =
            self.calculate_processing_time_statistics();

        MetricsSnapshot {
            timestamp: now,
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            updates: UpdateMetrics {
                received: self.updates_received.load(Ordering::Relaxed),
                malformed: self.updates_malformed.load(Ordering::Relaxed),
                ignored: self.updates_ignored.load(Ordering::Relaxed),
                unauthorized: self.updates_unauthorized.load(Ordering::Relaxed),
            },
            commands: CommandMetrics {
                volume_recorded: self.volume_recorded.load(Ordering::Relaxed),
                new_users_recorded: self.new_users_recorded.load(Ordering::Relaxed),
                failed: self.commands_failed.load(Ordering::Relaxed),
                avg_processing_time_ms,
                p50_processing_time_ms,
                p95_processing_time_ms,
                last_processed: self.last_update_processed(),
            },
            outbound: OutboundMetrics {
                replies_sent: self.replies_sent.load(Ordering::Relaxed),
                reply_failures: self.reply_failures.load(Ordering::Relaxed),
                sheet_writes: self.sheet_writes.load(Ordering::Relaxed),
                sheet_write_failures: self.sheet_write_failures.load(Ordering::Relaxed),
            },
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub updates: UpdateMetrics,
    pub commands: CommandMetrics,
    pub outbound: OutboundMetrics,
}

#[derive(Debug, Serialize)]
pub struct UpdateMetrics {
    pub received: u64,
    pub malformed: u64,
    pub ignored: u64,
    pub unauthorized: u64,
}

#[derive(Debug, Serialize)]
pub struct CommandMetrics {
    pub volume_recorded: u64,
    pub new_users_recorded: u64,
    pub failed: u64,
    pub avg_processing_time_ms: f64,
    pub p50_processing_time_ms: f64,
    pub p95_processing_time_ms: f64,
    pub last_processed: u64,
}

#[derive(Debug, Serialize)]
pub struct OutboundMetrics {
    pub replies_sent: u64,
    pub reply_failures: u64,
    pub sheet_writes: u64,
    pub sheet_write_failures: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower_value = sorted_data[index.floor() as usize] as f64;
        let upper_value = sorted_data[index.ceil() as usize] as f64;

        lower_value + (upper_value - lower_value) * index.fract()
    }
}
