//! teamsheet-bot
//!
//! A Telegram webhook bot that records team performance figures into a
//! shared Google Sheet.
//!
//! # Overview
//!
//! Team members report two figures in chat:
//!
//! - `/vol <number>`: cumulative volume for today
//! - `/user <count>`: new users for today
//!
//! Each member owns a block of columns on the worksheet and each calendar
//! day owns a row, so every report overwrites exactly one cell. Only
//! senders on the configured roster are accepted.
//!
//! # Quick Start
//!
//! ```rust
//! use teamsheet_bot::command::{parse_command, Metric};
//! use teamsheet_bot::layout::SheetLayout;
//!
//! let command = parse_command("/vol 1,500").unwrap().unwrap();
//! assert_eq!(command.metric, Metric::Volume);
//!
//! // second member, day 3 of the month
//! let cell = SheetLayout::default().cell_for(1, command.metric, 3);
//! assert_eq!(cell.to_a1(), "F5");
//! ```

pub mod chat;
pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod layout;
pub mod observability;
pub mod processor;
pub mod roster;
pub mod server;
pub mod sheets;
pub mod testing;

pub use chat::{ChatClient, ChatError, TelegramClient, TelegramConfig, Update};
pub use command::{parse_command, Command, CommandError, Metric, MetricValue};
pub use config::*;
pub use error::{BotError, BotResult};
pub use layout::{CellAddress, SheetLayout};
pub use processor::{IgnoreReason, MessageProcessor, ProcessOutcome};
pub use roster::{Roster, RosterEntry};
pub use server::{ServerState, WebhookServer};
pub use sheets::{GoogleSheetsClient, GoogleSheetsConfig, SheetClient, SheetError, TokenProvider};
