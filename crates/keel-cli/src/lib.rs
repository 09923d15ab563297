//! # keel-cli
//!
//! The `keel` command-line tool.
//!
//! Commands implement [`ManagementCommand`] and are collected in a
//! [`CommandRegistry`], which builds the clap parser and dispatches to the
//! selected command. The only built-in command is `migrate`, with the
//! `up`, `down` and `status` actions.
//!
//! ```rust
//! use keel_cli::command::CommandRegistry;
//! use keel_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//! assert_eq!(registry.list_commands(), vec!["migrate"]);
//! ```

// These clippy lints are intentionally allowed:
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: some functions may gain runtime logic later
// - result_large_err: CommandError wraps MigrationError
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]

pub mod command;
pub mod commands;

pub use command::{CommandError, CommandRegistry, ManagementCommand};
pub use commands::{register_builtin_commands, MigrateAction, MigrateCommand, MigrateOutcome};
