//! # keel-db
//!
//! Storage abstractions shared by keel's backends and its migration engine.
//! Nothing in this crate talks to a database directly; the concrete drivers
//! live in `keel-db-backends`.
//!
//! ## Module Overview
//!
//! - [`value`] - The backend-agnostic [`Value`] enum
//! - [`row`] - Result [`Row`]s and the [`FromValue`] conversion trait
//! - [`dialect`] - The [`Dialect`] enum and dialect tag parsing
//! - [`connection`] - The [`Executor`], [`Connection`] and [`Transaction`] traits
//! - [`options`] - Key-value access to the `options` table

// These clippy lints are intentionally allowed for the storage crate:
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: several accessors may grow non-const bodies
// - significant_drop_tightening: false positives with async Mutex guards
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::significant_drop_tightening)]

pub mod connection;
pub mod dialect;
pub mod options;
pub mod row;
pub mod value;

pub use connection::{Connection, Executor, Transaction};
pub use dialect::{Dialect, UnsupportedDialect};
pub use options::{OptionRecord, OptionStore};
pub use row::{FromValue, Row};
pub use value::{Params, Value};
