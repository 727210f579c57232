//! Core domain + application logic for the clip bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind a
//! port (trait) implemented in the adapter crate; the clip store itself is a
//! plain in-process component with an explicit lifecycle.

pub mod audit;
pub mod codegen;
pub mod config;
pub mod domain;
pub mod errors;
pub mod expiry;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod store;
pub mod sweep;

pub use errors::{Error, Result};
