use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    playlist::{Entry, Playlist},
    probe::{DEFAULT_PROBE_TIMEOUT, Liveness, Prober},
    util::truncate_string,
};

/// Pause after every probe so a playlist full of one provider's streams does
/// not hammer that provider
pub const DEFAULT_PROBE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Only the first N entries are tested; the rest are left out of the output
    pub max_channels: Option<usize>,
    pub timeout: Duration,
    pub delay: Duration,
}

impl CleanOptions {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            max_channels: None,
            timeout: DEFAULT_PROBE_TIMEOUT,
            delay: DEFAULT_PROBE_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanSummary {
    /// Entries found in the input
    pub loaded: usize,
    pub tested: usize,
    /// Entries written to the output
    pub kept: usize,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanOutcome {
    Completed(CleanSummary),
    /// Cancelled mid-run. Nothing was written.
    Interrupted { tested: usize },
}

/// Probes every entry of the input playlist in order and writes the ones that
/// answered to the output playlist.
///
/// # Errors
/// Errors when the input cannot be read or the output cannot be written
#[instrument(skip_all, fields(input = %options.input.display()))]
pub async fn clean(options: &CleanOptions, ct: &CancellationToken) -> Result<CleanOutcome> {
    let playlist = Playlist::read(&options.input).await?;
    info!(
        "Loaded {} channels from {}",
        playlist.entries.len(),
        options.input.display()
    );

    let prober = Prober::new(options.timeout)?;
    let survivors = match sweep(&playlist.entries, &prober, options, ct).await {
        Sweep::Finished(survivors) => survivors,
        Sweep::Interrupted { tested } => return Ok(CleanOutcome::Interrupted { tested }),
    };

    let tested = options
        .max_channels
        .map_or(playlist.entries.len(), |max| max.min(playlist.entries.len()));
    let kept = survivors.len();
    info!("Working channels: {kept}");

    playlist
        .cleaned(survivors)
        .write(&options.output)
        .await
        .context("Saving cleaned playlist")?;
    info!("Cleaned playlist written to: {}", options.output.display());

    Ok(CleanOutcome::Completed(CleanSummary {
        loaded: playlist.entries.len(),
        tested,
        kept,
        output: options.output.clone(),
    }))
}

enum Sweep {
    Finished(Vec<Entry>),
    Interrupted { tested: usize },
}

/// Probes entries one at a time, keeping the live ones in their original order
async fn sweep(
    entries: &[Entry],
    prober: &Prober,
    options: &CleanOptions,
    ct: &CancellationToken,
) -> Sweep {
    let total = entries.len();
    let to_test = options.max_channels.map_or(total, |max| max.min(total));

    let pb = ProgressBar::new(to_test as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style);
    }

    let mut survivors = Vec::new();
    for (idx, entry) in entries.iter().enumerate().take(to_test) {
        let idx = idx + 1;
        pb.set_message(truncate_string(entry.url(), 48));
        pb.suspend(|| info!("[{idx}/{total}] Testing: {}", entry.url()));

        let liveness = select! {
            biased;
            () = ct.cancelled() => {
                pb.abandon();
                return Sweep::Interrupted { tested: idx - 1 };
            }
            liveness = prober.probe(entry.url()) => liveness,
        };

        match liveness {
            Liveness::Live => {
                pb.suspend(|| info!("  → OK"));
                survivors.push(entry.clone());
            }
            Liveness::Dead(failure) => {
                pb.suspend(|| warn!("  → FAILED ({failure})"));
            }
        }
        pb.inc(1);

        select! {
            biased;
            () = ct.cancelled() => {
                pb.abandon();
                return Sweep::Interrupted { tested: idx };
            }
            () = tokio::time::sleep(options.delay) => {}
        }
    }
    pb.finish_and_clear();

    Sweep::Finished(survivors)
}
