//! Built-in commands.

pub mod migrate;

pub use migrate::{MigrateAction, MigrateCommand, MigrateOutcome};

use crate::command::CommandRegistry;

/// Registers all built-in commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(MigrateCommand::default()));
}
