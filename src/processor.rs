//! Update processing
//!
//! Turns one webhook update into at most one cell write and one reply:
//!
//! 1. Drop updates without a text message or from bots
//! 2. Drop senders that are not on the roster
//! 3. Parse `/vol` or `/user`; anything else is dropped silently
//! 4. Compute the target cell from today's date and the member's position
//! 5. Write the cell, then reply with a confirmation or a failure notice
//!
//! Nothing here returns an error to the caller. Telegram retries webhook
//! deliveries that are not answered with 200, and a retried `/vol` would
//! only repeat the same failure.

use crate::chat::{ChatClient, Message, Update};
use crate::command::{command_metric, parse_command, Metric, MetricValue};
use crate::config::BotConfig;
use crate::error::BotError;
use crate::layout::{CellAddress, SheetLayout};
use crate::observability::metrics::metrics;
use crate::roster::{Roster, RosterEntry};
use crate::sheets::SheetClient;
use crate::{sheet_span, update_span};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Why an update produced no write and no reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoMessage,
    NoText,
    NoSender,
    BotSender,
    Unauthorized,
    NotACommand,
}

/// Result of handling one update
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Ignored(IgnoreReason),
    Recorded {
        member: String,
        metric: Metric,
        value: MetricValue,
        cell: CellAddress,
    },
    Failed {
        member: String,
        metric: Metric,
        error: String,
    },
}

/// Dispatches parsed commands to the spreadsheet and replies in chat
pub struct MessageProcessor {
    chat: Arc<dyn ChatClient>,
    sheets: Arc<dyn SheetClient>,
    roster: Roster,
    layout: SheetLayout,
}

impl MessageProcessor {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        sheets: Arc<dyn SheetClient>,
        roster: Roster,
        layout: SheetLayout,
    ) -> Self {
        Self {
            chat,
            sheets,
            roster,
            layout,
        }
    }

    /// Build a processor with the roster and layout from configuration
    pub fn from_config(
        config: &BotConfig,
        chat: Arc<dyn ChatClient>,
        sheets: Arc<dyn SheetClient>,
    ) -> Self {
        Self::new(
            chat,
            sheets,
            Roster::from_members(&config.members),
            SheetLayout::from_config(&config.layout),
        )
    }

    /// Process an update against today's row
    pub async fn process_update(&self, update: &Update) -> ProcessOutcome {
        self.process_update_on(update, self.layout.today()).await
    }

    /// Process an update against the row for `day_of_month`
    pub async fn process_update_on(&self, update: &Update, day_of_month: u32) -> ProcessOutcome {
        let Some(message) = update.message.as_ref() else {
            return ignore(update.update_id, IgnoreReason::NoMessage);
        };
        let Some(text) = message.text.as_deref() else {
            return ignore(update.update_id, IgnoreReason::NoText);
        };
        let Some(sender) = message.from.as_ref() else {
            return ignore(update.update_id, IgnoreReason::NoSender);
        };
        if sender.is_bot {
            return ignore(update.update_id, IgnoreReason::BotSender);
        }

        let Some(member) = self.roster.lookup(sender.id) else {
            debug!(
                "Ignoring update {} from user {} (not on roster)",
                update.update_id, sender.id
            );
            metrics().update_unauthorized();
            return ProcessOutcome::Ignored(IgnoreReason::Unauthorized);
        };

        let Some(metric) = command_metric(text) else {
            return ignore(update.update_id, IgnoreReason::NotACommand);
        };

        let span = update_span!(
            update_id = update.update_id,
            member = %member.name,
            command = %metric
        );
        self.handle_command(message, member, metric, text, day_of_month)
            .instrument(span)
            .await
    }

    async fn handle_command(
        &self,
        message: &Message,
        member: &RosterEntry,
        metric: Metric,
        text: &str,
        day_of_month: u32,
    ) -> ProcessOutcome {
        let started = Instant::now();
        let chat_id = message.chat.id;

        let command = match parse_command(text) {
            Ok(Some(command)) => command,
            Ok(None) => return ProcessOutcome::Ignored(IgnoreReason::NotACommand),
            Err(e) => {
                return self
                    .fail(chat_id, member, metric, BotError::from(e), started)
                    .await
            }
        };

        let cell = self.layout.cell_for(member.index, command.metric, day_of_month);
        let span = sheet_span!(worksheet = self.sheets.worksheet(), cell = %cell);
        let result = self
            .sheets
            .update_cell(&cell, &command.value.to_json())
            .instrument(span)
            .await;
        metrics().sheet_write(result.is_ok());

        if let Err(e) = result {
            return self
                .fail(chat_id, member, metric, BotError::from(e), started)
                .await;
        }

        info!(
            "Recorded {} {} for {} at {}",
            metric, command.value, member.name, cell
        );
        self.reply(chat_id, &success_reply(&member.name, &command.value))
            .await;
        metrics().command_recorded(metric, started.elapsed());

        ProcessOutcome::Recorded {
            member: member.name.clone(),
            metric,
            value: command.value,
            cell,
        }
    }

    async fn fail(
        &self,
        chat_id: i64,
        member: &RosterEntry,
        metric: Metric,
        error: BotError,
        started: Instant,
    ) -> ProcessOutcome {
        warn!("Failed to process {} for {}: {}", metric, member.name, error);

        let user_message = error.user_message();
        self.reply(chat_id, &failure_reply(metric, &user_message))
            .await;
        metrics().command_failed(started.elapsed());

        ProcessOutcome::Failed {
            member: member.name.clone(),
            metric,
            error: user_message,
        }
    }

    /// Send a reply; delivery failures are logged and counted only
    async fn reply(&self, chat_id: i64, text: &str) {
        match self.chat.send_message(chat_id, text).await {
            Ok(()) => metrics().reply_sent(),
            Err(e) => {
                warn!(
                    "Could not deliver reply to chat {} via {}: {}",
                    chat_id,
                    self.chat.name(),
                    e
                );
                metrics().reply_failed();
            }
        }
    }
}

fn ignore(update_id: i64, reason: IgnoreReason) -> ProcessOutcome {
    debug!("Ignoring update {}: {:?}", update_id, reason);
    metrics().update_ignored();
    ProcessOutcome::Ignored(reason)
}

/// Confirmation text sent after a successful write
pub fn success_reply(member: &str, value: &MetricValue) -> String {
    match value {
        MetricValue::Volume(_) => format!("✅ Recorded cumulative vol {value} for {member}."),
        MetricValue::Count(_) => format!("✅ Recorded {value} new users for {member}."),
    }
}

/// Failure notice; `reason` must already be sanitized
pub fn failure_reply(metric: Metric, reason: &str) -> String {
    format!("❌ Failed to process {metric}: {reason}")
}
