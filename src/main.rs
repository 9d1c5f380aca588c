#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use clean::{CleanOptions, CleanOutcome, clean};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use util::spawn_ct_watcher;

pub mod clean;
pub mod playlist;
pub mod probe;
pub mod util;

#[cfg(test)]
mod test_server;

/// Tests M3U playlist links and writes out only the working channels
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the input M3U playlist
    input: PathBuf,

    /// Path to write the cleaned playlist to
    #[arg(default_value = "combined_clean.m3u")]
    output: PathBuf,

    /// Only test the first N channels (for quick tests)
    #[arg(long)]
    max_channels: Option<usize>,

    /// Seconds to wait for each stream before calling it dead
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Milliseconds to pause between probes
    #[arg(long, default_value_t = 300)]
    delay_ms: u64,

    /// Log probe failure details
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl From<Args> for CleanOptions {
    fn from(args: Args) -> Self {
        Self {
            max_channels: args.max_channels,
            timeout: Duration::from_secs(args.timeout),
            delay: Duration::from_millis(args.delay_ms),
            ..Self::new(args.input, args.output)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let ct = CancellationToken::new();
    spawn_ct_watcher(ct.clone());

    match clean(&args.into(), &ct).await? {
        CleanOutcome::Completed(summary) => {
            info!(
                "Kept {}/{} tested channels ({} in input) in {}",
                summary.kept,
                summary.tested,
                summary.loaded,
                summary.output.display()
            );
            Ok(())
        }
        CleanOutcome::Interrupted { .. } => {
            eprintln!("\nInterrupted by user.");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
