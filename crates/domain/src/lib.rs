//! Shared domain types for mnema: error taxonomy, chat message model,
//! provider stream events, the wire frame protocol, and configuration.

pub mod chat;
pub mod config;
pub mod error;
pub mod frame;
pub mod stream;

pub use error::{Error, Result};
