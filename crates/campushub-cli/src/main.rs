//! CampusHub CLI - sign in to CampusHub from a terminal.
//!
//! Restores the stored session on startup, then runs a single command
//! against it: login, register, logout, or one of the status queries.

mod cli;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use campushub_core::{Config, SessionSnapshot, SessionStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Command, USAGE};

// ============================================================================
// Constants
// ============================================================================

/// Password source for non-interactive use
const ENV_PASSWORD: &str = "CAMPUSHUB_PASSWORD";

/// Directory for an additional log file
const ENV_LOG_DIR: &str = "CAMPUSHUB_LOG_DIR";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard must be held until exit so buffered file logs flush.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(ENV_LOG_DIR) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "campushub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
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

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    config.apply_env();
    debug!(api = %config.api_base_url, storage = ?config.storage, "Config loaded");

    let store = Arc::new(config.session_store()?);
    let watcher = tokio::spawn(log_session_changes(store.subscribe()));

    store.initialize();
    store.wait_until_ready().await;

    let result = run(command, &store, &mut config).await;

    watcher.abort();
    result
}

/// Trace every session transition the store publishes
async fn log_session_changes(mut rx: watch::Receiver<SessionSnapshot>) {
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        debug!(
            ready = snapshot.ready,
            authenticated = snapshot.is_authenticated(),
            subject = ?snapshot.session.as_ref().and_then(|s| s.subject()),
            "Session changed"
        );
    }
}

async fn run(command: Command, store: &SessionStore, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = read_password()?;

            let session = store.login(&email, &password).await?;
            remember_email(config, email);
            println!("Signed in as {}", session.display_name());
        }
        Command::Register { email, full_name } => {
            let email = match email {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let full_name = match full_name {
                Some(name) => name,
                None => prompt("Full name: ")?,
            };
            let password = read_password()?;

            let session = store.register(&email, &password, &full_name).await?;
            remember_email(config, email);
            println!("Account created. Signed in as {}", session.display_name());
        }
        Command::Logout => {
            store.logout();
            println!("Signed out");
        }
        Command::Whoami => {
            store.expire_if_stale();
            let Some(session) = store.session() else {
                bail!("Not signed in");
            };
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Command::Status => {
            if store.expire_if_stale() {
                println!("Session expired");
            }
            let snapshot = store.snapshot();
            println!("ready: {}", snapshot.ready);
            match snapshot.session {
                Some(session) => {
                    println!("signed in: {}", session.display_name());
                    if let Some(role) = session.role() {
                        println!("role: {}", role);
                    }
                    if let Some(at) = session.expires_at() {
                        let minutes = session.minutes_until_expiry().unwrap_or(0);
                        let note = if session.expires_soon() { " (expiring soon)" } else { "" };
                        println!(
                            "expires: {} ({}m remaining){}",
                            at.format("%Y-%m-%d %H:%M UTC"),
                            minutes,
                            note
                        );
                    }
                }
                None => println!("signed in: no"),
            }
        }
        Command::Verify => {
            let user = store.verify().await?;
            println!("Session is valid");
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Help => println!("{}", USAGE),
    }
    Ok(())
}

fn remember_email(config: &mut Config, email: String) {
    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    info!("Remembered sign-in email");
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    if input.is_empty() {
        bail!("{} is required", label.trim_end_matches(": "));
    }
    Ok(input.to_string())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}
