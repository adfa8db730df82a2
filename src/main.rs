mod config;
mod env_loader;
mod extract;
mod render;
mod session;
mod transcript;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use session::Session;
use std::env;
use std::io::{self, Read};
use std::process;
use tracing_subscriber::EnvFilter;
use types::{StopFlags, StopInput};

/// Session Stop hook: archives the hook envelope and digests the transcript.
#[derive(Debug, Parser)]
#[command(name = "stopdigest", version)]
struct Args {
    /// Copy the parsed transcript to chat.json
    #[arg(long)]
    chat: bool,

    /// Generate session_summary.txt and session_summary.json
    #[arg(long)]
    summary: bool,
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("reading stdin")?;
    Ok(buffer)
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("STOPDIGEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn run(args: &Args) -> Result<()> {
    let input = read_stdin()?;
    let raw: serde_json::Value = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            // Not an envelope: nothing to archive.
            tracing::debug!(error = %e, "ignoring malformed hook input");
            return Ok(());
        }
    };
    let stop = StopInput::from_value(&raw).context("decoding hook input")?;

    let cwd = env::current_dir().context("resolving working directory")?;
    let config = Config::load(&cwd).unwrap_or_else(|err| {
        // Archival doesn't depend on the config file.
        tracing::warn!(error = %format!("{err:#}"), "ignoring unusable config, using defaults");
        Config::from_env()
    });
    let session = Session::open(&config, &stop.session_id)?;
    tracing::debug!(
        session_id = %stop.session_id,
        event = ?raw.get("hook_event_name"),
        stop_hook_active = ?raw.get("stop_hook_active"),
        dir = %session.dir().display(),
        "handling stop"
    );

    let flags = StopFlags {
        chat: args.chat,
        summary: args.summary,
    };
    if let Some(summary) = session.handle_stop(&stop, &raw, flags)? {
        println!("\n{summary}");
    }
    Ok(())
}

fn main() {
    env_loader::load_dotenv();
    init_tracing();

    // The hook never reports failure through its exit code.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            process::exit(0);
        }
    };

    if let Err(err) = run(&args) {
        eprintln!("stopdigest: {err:#}");
    }
}
