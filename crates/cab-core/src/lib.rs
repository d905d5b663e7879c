//! Core domain + application logic for the chat AI bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the model
//! gateway live behind ports (traits) implemented in adapter crates. The
//! core owns request dispatch and resource governance: key rotation, budget
//! accounting, bounded conversation history, and the admission ceiling for
//! in-flight model calls.

pub mod budget;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod history;
pub mod keyring;
pub mod logging;
pub mod model;

pub use errors::{Error, Result};
