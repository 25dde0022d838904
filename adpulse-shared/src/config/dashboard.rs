use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::debug;
use url::Url;

use super::ConfigError;

/// Backend used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "https://mixo-fe-backend-task.vercel.app";

/// File formats understood by [`Config::load_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// JSON (`.json`)
    Json,
    /// TOML (`.toml`)
    Toml,
}

impl ConfigFormat {
    /// Detects the format from a file extension.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFormat`] for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        extension.parse()
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        })
    }
}

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, coloured output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format",
                message: format!("expected 'pretty' or 'json', got '{other}'"),
            }),
        }
    }
}

/// REST and stream endpoint settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined to.
    pub base_url: Url,
    /// Bearer credential attached to one-shot requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Per-request timeout for one-shot reads, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            access_token: None,
            request_timeout_secs: 30,
        }
    }
}

/// Freshness windows and retry policy for one-shot reads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a per-campaign snapshot is served without refetching.
    pub insights_stale_secs: u64,
    /// How long the campaign list and aggregate insights stay fresh.
    pub list_stale_secs: u64,
    /// Extra attempts after the first failure before surfacing an error.
    pub retries: u32,
    /// Base delay before the first retry; doubles per attempt up to 30 seconds.
    pub retry_delay_ms: u64,
    /// Retry only transient failures (no response, 408, 429, 5xx) instead of every failure.
    pub retry_transient_only: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            insights_stale_secs: 15,
            list_stale_secs: 30,
            retries: 1,
            retry_delay_ms: 1_000,
            retry_transient_only: false,
        }
    }
}

/// Live stream settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    /// Capacity of the queue between the transport and the consumer.
    pub event_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { event_buffer: 256 }
    }
}

/// Logging settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Output style.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// The main configuration structure for the adpulse client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Backend endpoints and credentials.
    pub api: ApiConfig,
    /// Query freshness and retries.
    pub cache: CacheConfig,
    /// Live stream tuning.
    pub stream: StreamConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Location of the per-user configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join("adpulse").join("config.toml"))
    }

    /// Loads configuration, falling back to the per-user file when no path is given.
    ///
    /// # Errors
    /// See [`Config::load_from`].
    pub fn load_config(
        config_path: Option<PathBuf>,
        api_url_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let path = config_path.or_else(|| Self::default_path().filter(|path| path.exists()));
        Self::load_from(path.as_deref(), api_url_override)
    }

    /// Resolves configuration from defaults, `path`, the environment and `api_url_override`,
    /// in that order, then validates the result.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment variable
    /// holds an invalid value, or validation fails.
    pub fn load_from(
        path: Option<&Path>,
        api_url_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides()?;

        if let Some(url) = api_url_override {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration file; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, has an unsupported extension or
    /// does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), %format, "loading configuration file");
        Self::parse(&content, format)
    }

    /// Parses configuration text in the given format.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] when the text is malformed.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse { format, message };
        match format {
            ConfigFormat::Yaml => serde_yml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Applies `ADPULSE_*` environment variables on top of the current values.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when a variable cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(raw) = env_value("ADPULSE_API_URL") {
            self.api.base_url = Url::parse(&raw).map_err(|err| ConfigError::InvalidValue {
                field: "api.base_url",
                message: format!("ADPULSE_API_URL: {err}"),
            })?;
        }
        if let Some(token) = env_value("ADPULSE_ACCESS_TOKEN") {
            self.api.access_token = Some(token);
        }
        if let Some(raw) = env_value("ADPULSE_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs =
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "api.request_timeout_secs",
                    message: format!("ADPULSE_REQUEST_TIMEOUT_SECS must be a whole number, got '{raw}'"),
                })?;
        }
        if let Some(level) = env_value("ADPULSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(raw) = env_value("ADPULSE_LOG_FORMAT") {
            self.logging.format = raw.parse()?;
        }
        Ok(())
    }

    /// Validates values that parse fine but cannot work.
    ///
    /// # Errors
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.api.base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url",
                message: format!("scheme must be http or https, got '{}'", self.api.base_url.scheme()),
            });
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.request_timeout_secs",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.stream.event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stream.event_buffer",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Renders the configuration in the requested format, e.g. for a starter file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_string_pretty(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        let render_error = |message: String| ConfigError::Parse { format, message };
        match format {
            ConfigFormat::Yaml => serde_yml::to_string(self).map_err(|e| render_error(e.to_string())),
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| render_error(e.to_string()))
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| render_error(e.to_string()))
            }
        }
    }

    /// Timeout applied to every one-shot request.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Freshness window for per-campaign snapshots.
    #[must_use]
    pub const fn insights_stale_after(&self) -> Duration {
        Duration::from_secs(self.cache.insights_stale_secs)
    }

    /// Freshness window for the campaign list and aggregate insights.
    #[must_use]
    pub const fn list_stale_after(&self) -> Duration {
        Duration::from_secs(self.cache.list_stale_secs)
    }

    /// Delay before the first retry of a failed one-shot read.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.cache.retry_delay_ms)
    }
}

fn default_api_url() -> Url {
    // The constant is a well-formed absolute URL.
    Url::parse(DEFAULT_API_URL).unwrap_or_else(|_| unreachable!("DEFAULT_API_URL is valid"))
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
