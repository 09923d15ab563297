//! # keel-core
//!
//! Core types, settings and error types shared by every keel crate.
//! This crate has no database dependencies and provides the foundation for
//! the storage layer, the migration engine and the command line.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Runtime settings and database configuration
//! - [`settings_loader`] - Loading settings from TOML/JSON files and `KEEL_*` env vars
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{KeelError, KeelResult};
pub use settings::{DatabaseSettings, Settings};
