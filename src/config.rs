//! Configuration loading via `ortho-config`.
//!
//! Two layers are loaded independently: [`ScalewayConfig`] carries provider
//! credentials under the `SCW_` prefix shared with the Scaleway tooling, and
//! [`RotationConfig`] carries retention settings under `SNAPWARDEN_`. CLI
//! flags are applied on top by the binary before [`RotationConfig::resolve`]
//! validates the result.

use std::num::NonZeroUsize;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::fleet::DEFAULT_CONCURRENCY;
use crate::policy::{DEFAULT_MAX_SNAPSHOTS, RetentionPolicy};
use crate::tag::{TagError, TagFilter};

/// Tag selecting instances when nothing else is configured.
pub const DEFAULT_TAG: &str = "Lifecycle:legacy";

const CONFIG_FILE_NAME: &str = "snapwarden.toml";

/// Scaleway specific configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "SCW")]
pub struct ScalewayConfig {
    /// Access key assigned to the Scaleway application. Not needed for API
    /// calls; logged to identify the credentials in use.
    pub access_key: Option<String>,
    /// Secret key used for authentication. This value is required; it loads
    /// as empty when absent so [`Self::validate`] can say where to set it.
    #[ortho_config(default = String::new())]
    pub secret_key: String,
    /// Organisation identifier used by some Scaleway endpoints.
    pub default_organization_id: Option<String>,
    /// Project whose instances and snapshots are managed. Required.
    #[ortho_config(default = String::new())]
    pub default_project_id: String,
    /// Availability zone to operate in. Defaults to `fr-par-1`.
    #[ortho_config(default = "fr-par-1".to_owned())]
    pub default_zone: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to [{}] in {CONFIG_FILE_NAME}",
            self.env_var, self.toml_key, self.section
        )
    }
}

impl ScalewayConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("snapwarden")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new(
                "Scaleway API secret key",
                "SCW_SECRET_KEY",
                "secret_key",
                "scaleway",
            ),
        )?;
        Self::require_field(
            &self.default_project_id,
            &FieldMetadata::new(
                "Scaleway project ID",
                "SCW_DEFAULT_PROJECT_ID",
                "default_project_id",
                "scaleway",
            ),
        )?;
        Self::require_field(
            &self.default_zone,
            &FieldMetadata::new(
                "availability zone",
                "SCW_DEFAULT_ZONE",
                "default_zone",
                "scaleway",
            ),
        )?;
        Ok(())
    }
}

/// Retention settings loaded from `snapwarden.toml`, `SNAPWARDEN_*`
/// variables, and CLI overrides.
///
/// Values are kept raw so a bad count or tag is reported as a configuration
/// error by [`Self::resolve`] rather than as a loader failure.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SNAPWARDEN",
    discovery(
        app_name = "snapwarden",
        env_var = "SNAPWARDEN_CONFIG_PATH",
        config_file_name = "snapwarden.toml",
        dotfile_name = ".snapwarden.toml",
        project_file_name = "snapwarden.toml"
    )
)]
pub struct RotationConfig {
    /// Number of snapshots kept per volume.
    #[ortho_config(default = i64::from(DEFAULT_MAX_SNAPSHOTS))]
    pub max_snapshots: i64,
    /// Instance tag in `key:value` form.
    #[ortho_config(default = DEFAULT_TAG.to_owned())]
    pub tag: String,
    /// Number of volumes rotated at the same time.
    #[ortho_config(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Skips the follow-up listing that checks deletions took effect.
    #[ortho_config(default = false)]
    pub skip_deletion_check: bool,
    /// Where to write the JSON run report, if anywhere.
    pub report_file: Option<String>,
}

/// Validated rotation settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RotationSettings {
    /// Retention policy applied to every volume.
    pub policy: RetentionPolicy,
    /// Tag selecting the instances to back up.
    pub tag: TagFilter,
    /// Number of volumes rotated at the same time.
    pub concurrency: NonZeroUsize,
    /// Whether deletions are checked with a follow-up listing.
    pub verify_deletions: bool,
    /// Destination of the JSON run report.
    pub report_file: Option<Utf8PathBuf>,
}

impl RotationConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("snapwarden")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds the retention policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRetention`] when the count is below one.
    pub fn policy(&self) -> Result<RetentionPolicy, ConfigError> {
        RetentionPolicy::try_from(self.max_snapshots).map_err(|_| ConfigError::InvalidRetention {
            value: self.max_snapshots,
        })
    }

    /// Parses the instance tag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTag`] when the tag is not `key:value`.
    pub fn tag_filter(&self) -> Result<TagFilter, ConfigError> {
        self.tag.parse::<TagFilter>().map_err(ConfigError::from)
    }

    /// Returns the worker count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConcurrency`] when it is zero.
    pub fn concurrency(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.concurrency).ok_or(ConfigError::InvalidConcurrency)
    }

    /// Validates every setting.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn resolve(&self) -> Result<RotationSettings, ConfigError> {
        let report_file = match self.report_file.as_deref().map(str::trim) {
            None => None,
            Some("") => {
                return Err(ConfigError::MissingField(format!(
                    "empty report file path: {}",
                    FieldMetadata::new(
                        "report file",
                        "SNAPWARDEN_REPORT_FILE",
                        "report_file",
                        "snapwarden",
                    )
                    .hint()
                )));
            }
            Some(path) => Some(Utf8PathBuf::from(path)),
        };
        Ok(RotationSettings {
            policy: self.policy()?,
            tag: self.tag_filter()?,
            concurrency: self.concurrency()?,
            verify_deletions: !self.skip_deletion_check,
            report_file,
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// The retention count is zero or negative.
    #[error(
        "invalid retention count {value}: must be at least 1; set --num-backups, \
         SNAPWARDEN_MAX_SNAPSHOTS or max_snapshots in snapwarden.toml"
    )]
    InvalidRetention {
        /// Rejected value.
        value: i64,
    },
    /// The instance tag is not a `key:value` pair.
    #[error("invalid instance tag: {0}")]
    InvalidTag(#[from] TagError),
    /// Concurrency was set to zero.
    #[error(
        "invalid concurrency 0: must be at least 1; set --concurrency, \
         SNAPWARDEN_CONCURRENCY or concurrency in snapwarden.toml"
    )]
    InvalidConcurrency,
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
