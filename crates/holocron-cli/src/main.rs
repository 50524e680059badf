//! Holocron - a terminal catalogue browser for the Star Wars API.
//!
//! Browsing is gated behind a mock session: sign in with the demo account,
//! and the token is persisted, expires after 15 minutes, and is refreshed
//! silently while the browser runs.

mod app;
mod commands;

use std::io;

use anyhow::{bail, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use holocron_core::config::Config;

use app::App;

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "holocron.log";

const USAGE: &str = "\
Usage: holocron [COMMAND]

Commands:
  browse            sign in if needed, then browse characters (default)
  login [USERNAME]  sign in and keep the session
  logout            sign out and forget the stored token
  status            show the session state
  help              show this message

Environment:
  RUST_LOG                 log filter (default: warn)
  HOLOCRON_API_URL         API base URL (default: https://swapi.dev/api)
  HOLOCRON_TOKEN_BACKEND   'file' or 'keyring'";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when a cache directory exists, to a daily log
/// file there. The returned guard flushes the file writer on drop.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match Config::cache_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    info!("Holocron starting");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("browse");

    if matches!(command, "help" | "--help" | "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    let mut app = App::new(config)?;

    match command {
        "browse" => {
            if app.auth_gate().await? {
                app.run_browser().await?;
            } else {
                println!("Too many failed attempts.");
            }
        }
        "login" => {
            if app.is_authenticated() {
                println!("Already signed in.");
                app.print_status();
            } else if !app.login_interactive(args.get(2).cloned()).await? {
                bail!("Login failed");
            }
        }
        "logout" => app.logout(),
        "status" => app.print_status(),
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other);
        }
    }

    // Stop the refresh timer before the runtime shuts down
    app.session.dispose();
    info!("Holocron shutting down");
    Ok(())
}
