//! Configuration types for caption-batch

use crate::error::{Error, Result};
use crate::types::CaptionLength;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

/// Remote annotation service configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    /// Base URL of the Gemini REST API (default: https://generativelanguage.googleapis.com)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier (default: "gemini-3-flash-preview")
    #[serde(default = "default_model")]
    pub model: String,

    /// API credential; `None` until configured
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,

    /// Sampling temperature (default: 0.4)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling mass (default: 0.9)
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            request_timeout: default_request_timeout(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

// The credential never appears in logs
impl std::fmt::Debug for AnnotatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotatorConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .finish()
    }
}

/// Retry behavior for rate-limited annotation attempts
///
/// The delay before retry `n` (1-based) is
/// `initial_delay * backoff_multiplier^(n-1)`, capped at `max_delay`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per item, first attempt included (default: 6)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 80 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Batch run behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Caption length used until changed at runtime (default: long)
    #[serde(default)]
    pub default_length: CaptionLength,

    /// Pause after each successful annotation (default: 3.5 seconds)
    #[serde(default = "default_throttle_delay", with = "duration_ms_serde")]
    pub throttle_delay: Duration,

    /// Retry policy for rate-limited attempts
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_length: CaptionLength::default(),
            throttle_delay: default_throttle_delay(),
            retry: RetryConfig::default(),
        }
    }
}

/// Export naming
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Prefix of batch-level export files: `<prefix>_<YYYY-MM-DD>.<ext>` (default: "Caption_Batch")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key required in the X-Api-Key header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum request body size for image uploads (default: 64 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_address", &self.bind_address)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("cors_enabled", &self.cors_enabled)
            .field("cors_origins", &self.cors_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Main configuration for caption-batch
///
/// Every field has a default, so `{}` is a valid configuration file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote annotation service
    #[serde(default)]
    pub annotator: AnnotatorConfig,

    /// Run behavior (length, throttle, retries)
    #[serde(default)]
    pub batch: BatchConfig,

    /// Export naming
    #[serde(default)]
    pub export: ExportConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

/// Environment variable holding the annotation credential
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable overriding the API bind address
pub const ENV_BIND_ADDRESS: &str = "CAPTION_BIND_ADDRESS";

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                self.annotator.api_key = Some(key);
            }
        }
        if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
            self.api.bind_address = addr.parse().map_err(|e| {
                Error::config(
                    "api.bind_address",
                    format!("invalid {ENV_BIND_ADDRESS} '{addr}': {e}"),
                )
            })?;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let retry = &self.batch.retry;
        if retry.max_attempts == 0 {
            return Err(Error::config(
                "batch.retry.max_attempts",
                "must allow at least one attempt",
            ));
        }
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "batch.retry.backoff_multiplier",
                "must be a finite number of at least 1.0",
            ));
        }
        if retry.max_delay < retry.initial_delay {
            return Err(Error::config(
                "batch.retry.max_delay",
                "must not be shorter than initial_delay",
            ));
        }
        if !(0.0..=2.0).contains(&self.annotator.temperature) {
            return Err(Error::config(
                "annotator.temperature",
                "must be between 0.0 and 2.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.annotator.top_p) {
            return Err(Error::config("annotator.top_p", "must be between 0.0 and 1.0"));
        }
        if self.annotator.model.trim().is_empty() {
            return Err(Error::config("annotator.model", "must not be empty"));
        }
        if self.export.file_prefix.trim().is_empty() {
            return Err(Error::config("export.file_prefix", "must not be empty"));
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".into()
}

fn default_model() -> String {
    "gemini-3-flash-preview".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_temperature() -> f32 {
    0.4
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_attempts() -> u32 {
    6
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(80)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_throttle_delay() -> Duration {
    Duration::from_millis(3500)
}

fn default_file_prefix() -> String {
    "Caption_Batch".into()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_run_policy() {
        let config = Config::default();
        assert_eq!(config.batch.retry.max_attempts, 6);
        assert_eq!(config.batch.retry.initial_delay, Duration::from_secs(5));
        assert_eq!(config.batch.throttle_delay, Duration::from_millis(3500));
        assert_eq!(config.batch.default_length, CaptionLength::Long);
        assert!(!config.batch.retry.jitter);
        assert!(config.annotator.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_object_is_a_complete_config() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.annotator.model, "gemini-3-flash-preview");
        assert_eq!(config.export.file_prefix, "Caption_Batch");
    }

    #[test]
    fn durations_are_read_as_milliseconds() {
        let config: Config = serde_json::from_str(
            r#"{"batch": {"throttle_delay": 250, "retry": {"initial_delay": 10}}}"#,
        )
        .unwrap();
        assert_eq!(config.batch.throttle_delay, Duration::from_millis(250));
        assert_eq!(config.batch.retry.initial_delay, Duration::from_millis(10));
        assert_eq!(config.batch.retry.max_attempts, 6);
    }

    #[test]
    fn from_json_file_reads_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"annotator": {"model": "gemini-2.5-flash"}, "batch": {"default_length": "short"}}"#,
        )
        .unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.annotator.model, "gemini-2.5-flash");
        assert_eq!(config.batch.default_length, CaptionLength::Short);
    }

    #[test]
    fn from_json_file_reports_missing_file() {
        let err = Config::from_json_file("/nonexistent/caption.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("/nonexistent/caption.json"));
    }

    #[test]
    fn env_overrides_set_credential_and_bind_address() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_KEY, "  secret-key  "),
            (ENV_BIND_ADDRESS, "0.0.0.0:8080"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.annotator.api_key.as_deref(), Some("secret-key"));
        assert_eq!(config.api.bind_address.port(), 8080);
    }

    #[test]
    fn blank_env_credential_is_ignored() {
        let mut config = Config::default();
        config
            .apply_overrides_from(|k| (k == ENV_API_KEY).then(|| "   ".to_string()))
            .unwrap();
        assert!(config.annotator.api_key.is_none());
    }

    #[test]
    fn invalid_bind_address_is_a_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides_from(|k| (k == ENV_BIND_ADDRESS).then(|| "nope".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.batch.retry.max_attempts = 0;
        let err = config.validate().unwrap_err();
        match err {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("batch.retry.max_attempts"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let mut config = Config::default();
        config.batch.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_backoff() {
        for multiplier in [f64::INFINITY, f64::NAN] {
            let mut config = Config::default();
            config.batch.retry.backoff_multiplier = multiplier;
            match config.validate().unwrap_err() {
                Error::Config { key, .. } => {
                    assert_eq!(key.as_deref(), Some("batch.retry.backoff_multiplier"))
                }
                other => panic!("expected config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let mut config = Config::default();
        config.annotator.api_key = Some("top-secret".into());
        config.api.api_key = Some("also-secret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("also-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
