//! OperationClient - handles communication with the upstream generation API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::operation::Operation;
use crate::config::{Config, API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Default timeout for control-plane HTTP requests (30 seconds). The result
/// fetch is exempt: media downloads can legitimately take longer.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A generation request as supplied by the caller: which expression the story
/// illustrates and the story text itself. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub expression: String,
    pub story: String,
    /// Page tag for image jobs; absent for story videos.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_key: Option<String>,
}

impl GenerationRequest {
    pub fn new(expression: impl Into<String>, story: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            story: story.into(),
            page_key: None,
        }
    }

    /// The prompt sent upstream. Prompt engineering is out of scope here;
    /// the expression and story are forwarded as-is.
    pub fn prompt(&self) -> String {
        format!("{}\n\n{}", self.expression, self.story)
    }
}

/// Byte stream handed back by a result fetch, with the response metadata the
/// relay needs to mirror.
#[derive(Debug)]
pub struct FetchedMedia {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Consumed incrementally via `bytes_stream()`; never buffered whole.
    pub body: reqwest::Response,
}

/// Errors that can occur while talking to the upstream generation API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("API key not configured")]
    MissingCredentials,

    #[error("upstream request failed with status {status}: {body}")]
    Request { status: u16, body: String },

    #[error("upstream fetch failed with status {status}: {body}")]
    Fetch { status: u16, body: String },

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for the upstream long-running-operation API.
///
/// Pure request/response: no retries, no polling loops. Credentials are
/// injected at construction so tests can point a client at a mock server
/// without touching process environment.
pub struct OperationClient {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
    /// Separate client for result fetches: no overall timeout, since media
    /// transfers may outlast the control-plane budget.
    media_client: reqwest::Client,
}

impl OperationClient {
    /// Create a client by reading the API key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::MissingCredentials` if the variable is unset.
    pub fn from_env() -> Result<Self, UpstreamError> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| UpstreamError::MissingCredentials)?;
        Self::with_api_key(api_key)
    }

    /// Create a client with an explicit API key and default endpoint.
    pub fn with_api_key(api_key: String) -> Result<Self, UpstreamError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL. Useful for testing against a
    /// mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, UpstreamError> {
        if api_key.is_empty() {
            return Err(UpstreamError::MissingCredentials);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;
        let media_client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url,
            model: DEFAULT_MODEL.to_string(),
            http_client,
            media_client,
        })
    }

    /// Create a client from loaded configuration, falling back to the
    /// environment for the API key.
    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let api_key = match &config.upstream.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => std::env::var(API_KEY_ENV).map_err(|_| UpstreamError::MissingCredentials)?,
        };
        let base_url = config
            .upstream
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut client = Self::with_base_url(api_key, base_url)?;
        if let Some(model) = &config.upstream.model {
            client.model = model.clone();
        }
        Ok(client)
    }

    /// Override the model identifier.
    pub fn set_model(&mut self, model: String) {
        self.model = model;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submit a generation request, starting a long-running operation.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Request` on a non-success status,
    /// `UpstreamError::MalformedResponse` if the response carries no
    /// operation name, or `UpstreamError::Http` on transport failure.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<Operation, UpstreamError> {
        let url = format!(
            "{}/models/{}:predictLongRunning?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = serde_json::json!({
            "instances": [{ "prompt": request.prompt() }]
        });

        log::debug!(
            "submitting generation for expression {:?} to model {}",
            request.expression,
            self.model
        );

        let response = self.http_client.post(&url).json(&body).send().await?;
        let operation: Operation = Self::parse_operation(response).await?;

        if operation.name.is_empty() {
            return Err(UpstreamError::MalformedResponse(
                "submission response has no operation name".to_string(),
            ));
        }

        log::info!("operation {} started", operation.name);
        Ok(operation)
    }

    /// Poll an operation by name. A single GET; the caller decides when to
    /// call again.
    pub async fn poll(&self, operation_name: &str) -> Result<Operation, UpstreamError> {
        let url = format!("{}/{}?key={}", self.base_url, operation_name, self.api_key);

        let response = self.http_client.get(&url).send().await?;
        let operation = Self::parse_operation(response).await?;

        log::debug!(
            "polled {}: done={} response={} error={}",
            operation_name,
            operation.done,
            operation.response.is_some(),
            operation.error.is_some()
        );
        Ok(operation)
    }

    /// Fetch the bytes behind a result URI as an authenticated stream.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Fetch` on a non-success status, or
    /// `UpstreamError::Http` on transport failure.
    pub async fn fetch(&self, result_uri: &str) -> Result<FetchedMedia, UpstreamError> {
        let response = self
            .media_client
            .get(result_uri)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UpstreamError::Fetch { status, body });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        Ok(FetchedMedia {
            content_type,
            content_length,
            body: response,
        })
    }

    async fn parse_operation(response: reqwest::Response) -> Result<Operation, UpstreamError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UpstreamError::Request { status, body });
        }
        response.json().await.map_err(UpstreamError::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_with_api_key_creates_client() {
        let client = OperationClient::with_api_key("test-api-key".to_string()).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_with_api_key_empty_returns_error() {
        let result = OperationClient::with_api_key(String::new());
        assert!(matches!(result, Err(UpstreamError::MissingCredentials)));
    }

    #[test]
    fn test_with_base_url_creates_client() {
        let client = OperationClient::with_base_url(
            "test-key".to_string(),
            "https://custom.api".to_string(),
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://custom.api");
    }

    #[test]
    fn test_from_config_without_key_anywhere_fails() {
        // The config carries no key; clear the env var for the duration of
        // this check by using a config key instead of relying on the env.
        let config = Config::default();
        if std::env::var(API_KEY_ENV).is_err() {
            let result = OperationClient::from_config(&config);
            assert!(matches!(result, Err(UpstreamError::MissingCredentials)));
        }
    }

    #[test]
    fn test_from_config_uses_file_key_and_model() {
        let toml_str = r#"
            [upstream]
            api_key = "file-key"
            model = "veo-3.0-generate-preview"
            base_url = "https://mock.test/v1"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let client = OperationClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "https://mock.test/v1");
        assert_eq!(client.model(), "veo-3.0-generate-preview");
    }

    #[test]
    fn test_prompt_joins_expression_and_story() {
        let request = GenerationRequest::new("break the ice", "Mia broke the ice at the party.");
        let prompt = request.prompt();
        assert!(prompt.starts_with("break the ice"));
        assert!(prompt.contains("Mia broke the ice"));
    }

    #[test]
    fn test_request_serializes_camel_case_page_key() {
        let mut request = GenerationRequest::new("e", "s");
        request.page_key = Some("page-3".to_string());
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"pageKey\":\"page-3\""));

        let request = GenerationRequest::new("e", "s");
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("pageKey"));
    }

    #[test]
    fn test_upstream_error_display() {
        assert_eq!(
            UpstreamError::MissingCredentials.to_string(),
            "API key not configured"
        );
        let err = UpstreamError::Request {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "upstream request failed with status 500: boom"
        );
    }
}
