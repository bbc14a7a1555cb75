//! Playability probing: verify a resolved stream before showing it.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

/// Bounded window for a probe to produce any signal (8 seconds).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Reason code reported when the probe window elapses with no signal.
pub const PROBE_TIMEOUT_REASON: &str = "web_probe_timeout";

/// How many leading bytes the probe requests. Enough for container metadata,
/// small enough to stay cheap.
const PROBE_RANGE: &str = "bytes=0-65535";

/// Outcome of one probe attempt. `ok=false` always carries a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub reason: Option<String>,
}

impl ProbeOutcome {
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// A playability probe. Implementations must release any acquired resource
/// on every exit path, including timeout.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, uri: &str) -> ProbeOutcome;
}

/// Default probe with preload-metadata semantics: request the head of the
/// stream and treat the first successfully received bytes as "metadata
/// loaded". No decoding is attempted; a stream that cannot even deliver its
/// head will not play either.
pub struct HttpProbe {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn attempt(&self, uri: &str) -> Result<(), String> {
        let response = self
            .http_client
            .get(uri)
            .header(reqwest::header::RANGE, PROBE_RANGE)
            .send()
            .await
            .map_err(|err| media_error_reason(0, &err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = status.canonical_reason().unwrap_or("request failed");
            return Err(media_error_reason(status.as_u16(), text));
        }

        // First delivered chunk counts as the "can play" signal.
        let mut stream = response.bytes_stream();
        match stream.next().await {
            Some(Ok(chunk)) if !chunk.is_empty() => Ok(()),
            Some(Ok(_)) | None => Err(media_error_reason(0, "empty body")),
            Some(Err(err)) => Err(media_error_reason(0, &err.to_string())),
        }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for HttpProbe {
    async fn probe(&self, uri: &str) -> ProbeOutcome {
        // Timing out drops the in-flight request, which releases the
        // connection; nothing is leaked on any exit path.
        match tokio::time::timeout(self.timeout, self.attempt(uri)).await {
            Err(_) => {
                log::warn!("probe of {uri} produced no signal within {:?}", self.timeout);
                ProbeOutcome::fail(PROBE_TIMEOUT_REASON)
            }
            Ok(Ok(())) => ProbeOutcome::pass(),
            Ok(Err(reason)) => {
                log::warn!("probe of {uri} failed: {reason}");
                ProbeOutcome::fail(reason)
            }
        }
    }
}

/// Reason code for a failed probe: `media_error_<code>_<message>` with the
/// message flattened to a single token.
fn media_error_reason(code: u16, message: &str) -> String {
    let flattened: String = message
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("media_error_{code}_{flattened}")
}
