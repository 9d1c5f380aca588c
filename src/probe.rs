use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use tokio_stream::StreamExt;
use tracing::{debug, instrument};

/// Some IPTV servers refuse clients that do not look like a media player
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0 (Kodi-Check/1.0)";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a stream answered its probe
#[derive(Debug)]
pub enum Liveness {
    Live,
    Dead(ProbeFailure),
}

/// Why a stream was judged dead
#[derive(Debug, thiserror::Error)]
pub enum ProbeFailure {
    /// Connection, DNS, malformed URL, or timeout
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("response body was empty")]
    EmptyBody,
}

/// Issues single-shot liveness probes against stream URLs
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    /// # Errors
    /// Errors when the HTTP client cannot be initialized
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            // Every probe gets its own connection
            .pool_max_idle_per_host(0)
            .build()
            .context("Building HTTP client")?;

        Ok(Self { client })
    }

    /// Sends one GET to `url` and waits for the first bytes of the body.
    ///
    /// Never retries, and every failure ends up as [`Liveness::Dead`].
    #[instrument(skip(self))]
    pub async fn probe(&self, url: &str) -> Liveness {
        match self.try_probe(url).await {
            Ok(()) => Liveness::Live,
            Err(failure) => {
                debug!("Probe failed: {failure}");
                Liveness::Dead(failure)
            }
        }
    }

    async fn try_probe(&self, url: &str) -> Result<(), ProbeFailure> {
        let res = self.client.get(url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(ProbeFailure::Status(status));
        }

        // The body of a live stream never ends, so only wait for its first bytes
        let mut body = res.bytes_stream();
        while let Some(chunk) = body.next().await {
            if !chunk?.is_empty() {
                return Ok(());
            }
        }

        Err(ProbeFailure::EmptyBody)
    }
}
