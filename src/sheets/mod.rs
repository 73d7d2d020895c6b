//! Spreadsheet client abstraction
//!
//! The bot writes one cell per command. `SheetClient` is the seam the
//! processor depends on; `GoogleSheetsClient` implements it against the
//! Google Sheets v4 REST API using service-account credentials.

pub mod auth;
pub mod client;
pub mod google;

pub use auth::{ServiceAccountKey, TokenProvider};
pub use client::*;
pub use google::{GoogleSheetsClient, GoogleSheetsConfig};
