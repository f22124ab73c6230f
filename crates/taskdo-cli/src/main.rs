//! taskdo - Task To Do from the terminal.
//!
//! # Examples
//!
//! ```bash
//! # Log in (password is prompted for)
//! taskdo login --username jdoe
//!
//! # List and inspect projects
//! taskdo project list
//! taskdo project get 12 14 --json
//!
//! # Create and delete
//! taskdo project create --name "Launch" --description "Ship v1"
//! taskdo project delete 12
//! ```

mod cli;
mod commands;
mod output;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskdo_core::{Config, Session};

use crate::cli::{Cli, Commands};
use crate::commands::Printer;

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "taskdo.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_to_file.then(|| config.cache_dir()) {
        Some(Ok(dir)) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _guard = init_tracing(&config);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mut config: Config) -> Result<()> {
    // Base URL: explicit flag > environment > config file > default
    let mut effective = config.clone();
    if let Some(url) = cli.base_url.or_else(|| std::env::var("TASKDO_BASE_URL").ok()) {
        effective.base_url = Some(url);
    }
    debug!(
        base_url = effective.base_url(),
        backend = ?effective.token_backend,
        "Configuration resolved"
    );

    let api = effective.api_client()?;
    let store = effective.token_store()?;
    // Login and logout replace the credential without needing its identity
    let mut session = match cli.command {
        Commands::Login { .. } | Commands::Logout => Session::restore(api, store),
        _ => Session::resume(api, store).await,
    };
    let printer = Printer { json: cli.json };

    info!(state = ?session.state(), "taskdo starting");

    match cli.command {
        Commands::Login { username } => {
            commands::login(&mut session, &mut config, username, &printer).await
        }
        Commands::Logout => commands::logout(&mut session),
        Commands::Whoami => commands::whoami(&mut session, &printer).await,
        Commands::Status => commands::status(&session, &printer),
        Commands::Project { action } => commands::project(&mut session, action, &printer).await,
    }
}
