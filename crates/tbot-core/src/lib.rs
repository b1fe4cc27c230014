//! Core domain + application logic for the tiny chat bot.
//!
//! This crate is intentionally transport-agnostic. The chat platform's HTTP API
//! lives behind the `Transport` port, implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod poll;
pub mod queue;
pub mod sender;
pub mod shell;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use errors::{Error, Result};
