//! Structured logging setup.
//!
//! Logs go to stderr so stdout stays reserved for the run summary.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_ENV_VAR: &str = "SNAPWARDEN_LOG";

const DEFAULT_DIRECTIVES: &str = "info";
const VERBOSE_DIRECTIVE: &str = "snapwarden=debug";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// The filter directives could not be parsed.
    #[error("invalid {LOG_ENV_VAR} value {directives:?}: {message}")]
    InvalidFilter {
        /// Rejected directive string.
        directives: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Builds the log filter from `raw` directives (usually the value of
/// [`LOG_ENV_VAR`]), falling back to `info`. `verbose` adds debug output for
/// this crate on top.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidFilter`] when the directives do not parse.
pub fn build_filter(verbose: bool, raw: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let directives = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES);
    let invalid = |message: String| LoggingError::InvalidFilter {
        directives: directives.to_owned(),
        message,
    };
    let filter = EnvFilter::try_new(directives).map_err(|err| invalid(err.to_string()))?;
    if !verbose {
        return Ok(filter);
    }
    let directive = VERBOSE_DIRECTIVE
        .parse::<Directive>()
        .map_err(|err| invalid(err.to_string()))?;
    Ok(filter.add_directive(directive))
}

/// Installs the global subscriber, reading [`LOG_ENV_VAR`].
///
/// # Errors
///
/// Returns [`LoggingError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(verbose: bool) -> Result<(), LoggingError> {
    let directives = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(verbose, directives.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))
}
