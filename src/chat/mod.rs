//! Chat client abstraction
//!
//! The processor only needs to send replies, so the chat side is a small
//! trait with a Telegram Bot API implementation behind it.

pub mod client;
pub mod telegram;
pub mod types;

pub use client::*;
pub use telegram::*;
pub use types::*;
