//! sigref - headless client for SIGREF school monitoring.
//!
//! Reads from the local cache first and refreshes from the server when it
//! can be reached. Questionnaire responses answered offline are queued and
//! delivered later.

mod commands;
mod render;

use std::io;
use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sigref_core::config::Config;

const USAGE: &str = "\
Usage: sigref <command> [args]

Commands:
  login [username]                   Sign in (password from SIGREF_PASSWORD, keychain or prompt)
  logout [--forget]                  Sign out; --forget also removes the saved password
  status                             Connectivity, session, cache age and queue size
  sync [--force]                     Refresh master data (only when due unless --force)
  schools [query]                    Search schools
  questionnaires <school-id>         Questionnaires of a school
  dashboard <school-id>              Statistics of a school
  answer <school-id> <questionnaire-id>
                                     Answer a questionnaire interactively
  pending                            List responses waiting to be sent
  drain                              Send queued responses now
  watch                              Run background sync and delivery until Ctrl-C

Set RUST_LOG to change the log level (default: warn).";

/// Log to stderr and to a daily file in the cache directory.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, "sigref.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
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
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            Config::default()
        }
    };
    let log_dir = config.cache_dir().ok().map(|d| d.join("logs"));
    let _guard = init_tracing(log_dir.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    info!(command = %command, "sigref starting");
    match command.as_str() {
        "login" => commands::login(config, rest.first().cloned()).await,
        "logout" => commands::logout(config, has_flag(rest, "--forget")),
        "status" => commands::status(config).await,
        "sync" => commands::sync(config, has_flag(rest, "--force")).await,
        "schools" => commands::schools(config, &rest.join(" ")).await,
        "questionnaires" => commands::questionnaires(config, parse_id(rest, 0, "school-id")?).await,
        "dashboard" => commands::dashboard(config, parse_id(rest, 0, "school-id")?).await,
        "answer" => {
            let school_id = parse_id(rest, 0, "school-id")?;
            let questionnaire_id = parse_id(rest, 1, "questionnaire-id")?;
            commands::answer(config, school_id, questionnaire_id).await
        }
        "pending" => commands::pending(config).await,
        "drain" => commands::drain(config).await,
        "watch" => commands::watch(config).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_id(args: &[String], index: usize, name: &str) -> Result<i64> {
    match args.get(index) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a number, got '{}'", name, raw)),
        None => bail!("Missing <{}>\n\n{}", name, USAGE),
    }
}
