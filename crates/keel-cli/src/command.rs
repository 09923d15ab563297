//! Command framework for the `keel` binary.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI
//! commands and [`CommandRegistry`] for registering and dispatching them.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use keel_cli::command::{CommandError, ManagementCommand};
//! use keel_core::Settings;
//!
//! struct PingCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for PingCommand {
//!     fn name(&self) -> &str { "ping" }
//!     fn help(&self) -> &str { "Check the database connection" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         _settings: &Settings,
//!     ) -> Result<(), CommandError> {
//!         println!("pong");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use keel_core::{KeelError, Settings};
use keel_migrations::MigrationError;
use thiserror::Error;

/// Errors surfaced by a command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Settings, connection, or storage failure outside a migration.
    #[error(transparent)]
    Keel(#[from] KeelError),

    /// A migration run failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// The command line could not be dispatched.
    #[error("{0}")]
    Usage(String),

    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// A command that can be registered and invoked through the CLI.
///
/// All commands must be `Send + Sync` so they can run on any tokio worker.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), CommandError>;
}

/// A registry of commands, keyed by name.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap `Command` with every registered subcommand.
    ///
    /// The global `--config` option names a TOML or JSON settings file.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("keel")
            .about("Versioned, reversible schema migrations")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("config")
                    .long("config")
                    .short('c')
                    .global(true)
                    .value_name("PATH")
                    .help("Settings file (.toml or .json)"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, cmd) in entries {
            // clap wants 'static names; commands are registered once at startup.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Dispatches to the command selected in `matches`.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), CommandError> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| CommandError::Usage("No command specified".to_string()))?;

        let cmd = self
            .get(name)
            .ok_or_else(|| CommandError::Usage(format!("Unknown command: {name}")))?;

        tracing::debug!(command = name, "dispatching command");
        cmd.handle(sub_matches, settings).await
    }
}
