//! Configuration for the story-media server and pollers.
//!
//! Loads configuration from `~/.config/story-media/config.toml` or a custom
//! path. The upstream API key is read from the `GEMINI_API_KEY` environment
//! variable when the file does not provide one; a missing key fails client
//! construction before any network call is attempted.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The environment variable name for the upstream API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default base URL for the upstream generation API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for story video generation.
pub const DEFAULT_MODEL: &str = "veo-2.0-generate-001";

/// Default server-side polling interval (3 seconds).
pub const DEFAULT_SERVER_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default client-side polling interval (2.5 seconds).
pub const DEFAULT_CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(2500);

/// Default polling deadline on both sides (180 seconds).
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(180);

/// Default cap on concurrently running job pollers.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 8;

/// How long finished job records stay queryable before eviction (10 minutes).
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(600);

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("poll interval ({interval_ms} ms) must be shorter than the deadline ({deadline_ms} ms)")]
    InvalidBudget { interval_ms: u64, deadline_ms: u64 },
}

/// Time budget governing a polling loop: how often to poll and how long to
/// keep trying before forcing a timeout.
///
/// Both deadlines in the system (server-side job poller, client-side status
/// poller) are expressed as a `PollBudget`. The deadline is hard wall-clock
/// time measured from the start of the loop, not an idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub interval: Duration,
    pub deadline: Duration,
}

impl PollBudget {
    /// Create a budget, rejecting intervals that are not shorter than the
    /// deadline.
    pub fn new(interval: Duration, deadline: Duration) -> Result<Self, ConfigError> {
        if interval >= deadline {
            return Err(ConfigError::InvalidBudget {
                interval_ms: interval.as_millis() as u64,
                deadline_ms: deadline.as_millis() as u64,
            });
        }
        Ok(Self { interval, deadline })
    }

    /// Default budget for the server-side job poller.
    pub fn server_default() -> Self {
        Self {
            interval: DEFAULT_SERVER_POLL_INTERVAL,
            deadline: DEFAULT_POLL_DEADLINE,
        }
    }

    /// Default budget for the client-side status poller. The deadline matches
    /// the server default; it must never be shorter, since a server timeout
    /// already surfaces as a terminal status the client will observe.
    pub fn client_default() -> Self {
        Self {
            interval: DEFAULT_CLIENT_POLL_INTERVAL,
            deadline: DEFAULT_POLL_DEADLINE,
        }
    }
}

/// Configuration file structure for story-media.
/// Loaded from ~/.config/story-media/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpstreamConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// API key override. Normally left unset and supplied via `GEMINI_API_KEY`.
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_concurrent_jobs: Option<usize>,
    /// Seconds a finished job record stays queryable before eviction.
    pub job_retention_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PollConfig {
    pub interval_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
}

impl Config {
    /// Load configuration from a specific path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default path, falling back to defaults if
    /// no file exists there.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Default config file location: ~/.config/story-media/config.toml.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("story-media").join("config.toml"))
    }

    /// Resolve the server-side poll budget from the `[poll]` section.
    pub fn server_budget(&self) -> Result<PollBudget, ConfigError> {
        let interval = self
            .poll
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SERVER_POLL_INTERVAL);
        let deadline = self
            .poll
            .deadline_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_DEADLINE);
        PollBudget::new(interval, deadline)
    }

    pub fn host(&self) -> &str {
        self.server.host.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(8787)
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.server
            .max_concurrent_jobs
            .unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS)
    }

    pub fn job_retention(&self) -> Duration {
        self.server
            .job_retention_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_JOB_RETENTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_budget_rejects_interval_at_or_over_deadline() {
        let result = PollBudget::new(Duration::from_secs(10), Duration::from_secs(10));
        assert!(matches!(result, Err(ConfigError::InvalidBudget { .. })));

        let result = PollBudget::new(Duration::from_secs(11), Duration::from_secs(10));
        assert!(matches!(result, Err(ConfigError::InvalidBudget { .. })));
    }

    #[test]
    fn test_poll_budget_accepts_valid_interval() {
        let budget = PollBudget::new(Duration::from_secs(3), Duration::from_secs(180)).unwrap();
        assert_eq!(budget.interval, Duration::from_secs(3));
        assert_eq!(budget.deadline, Duration::from_secs(180));
    }

    #[test]
    fn test_default_budgets_are_valid() {
        let server = PollBudget::server_default();
        assert!(server.interval < server.deadline);

        let client = PollBudget::client_default();
        assert!(client.interval < client.deadline);
        // Client deadline must be at least the server deadline.
        assert!(client.deadline >= server.deadline);
    }

    #[test]
    fn test_empty_config_parses_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.upstream.model.is_none());
        assert_eq!(config.port(), 8787);
        assert_eq!(config.max_concurrent_jobs(), DEFAULT_MAX_CONCURRENT_JOBS);
        assert_eq!(config.job_retention(), DEFAULT_JOB_RETENTION);
        let budget = config.server_budget().unwrap();
        assert_eq!(budget, PollBudget::server_default());
    }

    #[test]
    fn test_full_config_parses() {
        let toml_str = r#"
            [upstream]
            model = "veo-3.0-generate-preview"
            base_url = "https://example.test/v1"

            [server]
            host = "127.0.0.1"
            port = 9000
            max_concurrent_jobs = 2
            job_retention_secs = 120

            [poll]
            interval_ms = 2500
            deadline_ms = 60000
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.upstream.model.as_deref(),
            Some("veo-3.0-generate-preview")
        );
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.port(), 9000);
        assert_eq!(config.max_concurrent_jobs(), 2);
        assert_eq!(config.job_retention(), Duration::from_secs(120));
        let budget = config.server_budget().unwrap();
        assert_eq!(budget.interval, Duration::from_millis(2500));
        assert_eq!(budget.deadline, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_budget_in_config_is_rejected() {
        let toml_str = r#"
            [poll]
            interval_ms = 60000
            deadline_ms = 5000
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            config.server_budget(),
            Err(ConfigError::InvalidBudget { .. })
        ));
    }

    #[test]
    fn test_load_reads_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 4000").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.port(), 4000);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load(Path::new("/nonexistent/story-media.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
