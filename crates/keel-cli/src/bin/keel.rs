//! The `keel` binary.
//!
//! ```bash
//! keel --config keel.toml migrate up
//! KEEL_DATABASE_ENGINE=postgres KEEL_DATABASE_NAME=app keel migrate status
//! ```
//!
//! Without `--config`, settings come from the defaults plus `KEEL_*`
//! environment overrides.

use std::process::ExitCode;

use keel_cli::command::{CommandError, CommandRegistry};
use keel_cli::commands::register_builtin_commands;
use keel_core::logging::setup_logging;
use keel_core::{settings_loader, Settings};

fn load_settings(matches: &clap::ArgMatches) -> Result<Settings, CommandError> {
    let path = matches
        .subcommand()
        .and_then(|(_, sub)| sub.get_one::<String>("config"))
        .or_else(|| matches.get_one::<String>("config"));

    match path {
        Some(path) => Ok(settings_loader::from_file_with_env(path)?),
        None => Ok(settings_loader::from_env()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);

    let matches = registry.build_cli().get_matches();

    let settings = match load_settings(&matches) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&settings);

    match registry.execute(&matches, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
