//! # Configuration
//!
//! Layered configuration for the dashboard client: built-in defaults, an
//! optional YAML/JSON/TOML file, `ADPULSE_*` environment variables and finally
//! explicit command-line overrides.

pub mod dashboard;


pub use dashboard::{
    ApiConfig, CacheConfig, Config, ConfigFormat, LogFormat, LoggingConfig, StreamConfig,
};

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file exists but its contents are not valid for the detected format.
    #[error("invalid {format} configuration: {message}")]
    Parse {
        /// Format the file was parsed as.
        format: ConfigFormat,
        /// Parser message.
        message: String,
    },

    /// The file extension does not map to a supported format.
    #[error("unsupported configuration format '{0}'; use yaml, json or toml")]
    UnsupportedFormat(String),

    /// A value was syntactically valid but semantically wrong.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Dotted field path, e.g. `api.base_url`.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}
