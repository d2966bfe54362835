//! Error types for the Scaleway provider.

use crate::config::ConfigError;
use scaleway_rs::ScalewayError;
use thiserror::Error;

/// Errors raised by the Scaleway provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScalewayProviderError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a request never produced an HTTP response.
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        /// Endpoint being called.
        endpoint: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the API answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        /// Endpoint being called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the API.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("unexpected response from {endpoint}: {message}")]
    Decode {
        /// Endpoint being called.
        endpoint: String,
        /// Decoder message.
        message: String,
    },
    /// Raised when a snapshot carries no creation time and so cannot be ranked.
    #[error("snapshot {snapshot_id} has no creation time")]
    MissingTimestamp {
        /// Snapshot identifier.
        snapshot_id: String,
    },
    /// Wrapper for instance SDK failures.
    #[error("provider error: {message}")]
    Provider {
        /// Message returned by the provider SDK.
        message: String,
    },
}

impl From<ScalewayError> for ScalewayProviderError {
    fn from(value: ScalewayError) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<ConfigError> for ScalewayProviderError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
