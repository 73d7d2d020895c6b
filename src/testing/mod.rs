//! Testing utilities and mock implementations
//!
//! Mock chat and spreadsheet clients for exercising the bot without
//! network access.

pub mod mocks;

pub use mocks::*;
