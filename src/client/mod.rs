//! Client-side generation poller.
//!
//! Runs on the requesting side: creates a job through the job status
//! service, polls its status to a terminal outcome under its own deadline,
//! resolves the stream URL, and (where the platform requires it) probes the
//! stream before handing a playback decision to presentation. The client
//! never talks to the upstream API or sees its credentials.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::config::PollBudget;
use crate::playback::{decide_playback, HttpProbe, MediaResult, ProbeOutcome, Prober};
use crate::upstream::GenerationRequest;

/// Default timeout for individual status requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by [`MediaClient::generate`].
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("job creation failed: {0}")]
    JobCreation(String),

    #[error("generation failed: {message}")]
    GenerationFailed { message: String },

    #[error("generation timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusWire {
    #[serde(default)]
    job_id: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the job status service.
pub struct MediaClient {
    base_url: String,
    http_client: reqwest::Client,
    budget: PollBudget,
    prober: Option<Box<dyn Prober>>,
}

impl MediaClient {
    /// Create a client against a service base URL, with the default client
    /// budget and no playability probing.
    pub fn new(base_url: impl Into<String>) -> Result<Self, GenerateError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: trim_trailing_slash(base_url.into()),
            http_client,
            budget: PollBudget::client_default(),
            prober: None,
        })
    }

    /// Override the poll budget. The deadline should be at least the
    /// server-side deadline; a server timeout surfaces as a terminal status
    /// this poller will observe normally.
    pub fn with_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Enable playability probing with the default HTTP probe. Intended for
    /// platforms without a trusted native decoder.
    pub fn with_probing(self) -> Self {
        self.with_prober(Box::new(HttpProbe::new()))
    }

    /// Enable probing with a specific prober implementation.
    pub fn with_prober(mut self, prober: Box<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one generation end to end: create the job, poll it to a terminal
    /// status, resolve the stream URL, and decide playback.
    ///
    /// # Errors
    ///
    /// `GenerateError::JobCreation` if the service refuses the job or
    /// returns no job id, `GenerateError::GenerationFailed` if the job ends
    /// in error, `GenerateError::Timeout` if the client deadline elapses
    /// first. A failed probe is not an error; it downgrades the result to a
    /// fallback playback.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<MediaResult, GenerateError> {
        let job_id = self.create_job(request).await?;
        log::info!("job {job_id} created, polling for completion");

        self.poll_until_ready(&job_id).await?;

        let stream_url = format!("{}/jobs/{}/stream", self.base_url, job_id);
        let outcome = self.run_probe(&stream_url).await;
        let playback = decide_playback(outcome.as_ref());

        Ok(MediaResult::new(stream_url, playback))
    }

    async fn create_job(&self, request: &GenerationRequest) -> Result<String, GenerateError> {
        let url = format!("{}/jobs", self.base_url);
        let response = self.http_client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerateError::JobCreation(format!(
                "service returned status {status}: {body}"
            )));
        }

        let created: JobStatusWire = response.json().await?;
        if created.job_id.is_empty() {
            return Err(GenerateError::JobCreation(
                "no job id returned".to_string(),
            ));
        }
        Ok(created.job_id)
    }

    async fn poll_until_ready(&self, job_id: &str) -> Result<(), GenerateError> {
        let started = Instant::now();
        let url = format!("{}/jobs/{}", self.base_url, job_id);

        loop {
            if started.elapsed() >= self.budget.deadline {
                log::warn!("job {job_id} did not finish within {:?}", self.budget.deadline);
                return Err(GenerateError::Timeout);
            }

            tokio::time::sleep(self.budget.interval).await;

            let response = self.http_client.get(&url).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                return Err(GenerateError::GenerationFailed {
                    message: format!("status check failed with status {status}"),
                });
            }

            let wire: JobStatusWire = response.json().await?;
            match wire.status.as_str() {
                "ready" => return Ok(()),
                "error" => {
                    return Err(GenerateError::GenerationFailed {
                        message: wire
                            .message
                            .unwrap_or_else(|| "generation failed".to_string()),
                    })
                }
                _ => {
                    log::debug!("job {job_id} still {}", wire.status);
                }
            }
        }
    }

    async fn run_probe(&self, stream_url: &str) -> Option<ProbeOutcome> {
        let prober = self.prober.as_ref()?;
        log::debug!("probing {stream_url} before playback");
        Some(prober.probe(stream_url).await)
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
