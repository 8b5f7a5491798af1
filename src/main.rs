mod error;
mod replay;

use crate::error::{ErrorKind, Result};
use buildcache_config::Config;
use buildcache_store::{Reconciler, Store};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "buildcache")]
#[command(about = "Audit the cache state of game builds from a recorded event log")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay backend events and print the resulting state of every build
    Replay {
        /// JSON document listing the known builds
        #[arg(long)]
        versions: PathBuf,

        /// JSON-lines log of `{"event": ..., "payload": ...}` records
        #[arg(long)]
        events: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;

    match cli.command {
        Commands::Replay { versions, events } => {
            let versions = replay::read_versions(&versions)?;
            let log = File::open(&events).or_raise(|| ErrorKind::Read(events.display().to_string()))?;
            let reconciler = Reconciler::new(Store::new());
            let stats = replay::replay(&reconciler, BufReader::new(log))?;
            tracing::info!(applied = stats.applied, ignored = stats.ignored, "Replayed event log");
            for line in replay::audit(reconciler.store(), &versions, &config.protected()) {
                println!("{line}");
            }
        },
    }
    Ok(())
}
