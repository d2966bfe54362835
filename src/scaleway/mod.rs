//! Scaleway implementation of snapshot discovery, creation, listing, and
//! deletion.
//!
//! Instances are found through the Instance API and snapshots are managed
//! through the Block Storage API. Every snapshot created here carries a
//! `creator=snapwarden` tag and listings ignore everything else, so snapshots
//! made by hand or by other tools are never rotated.

mod discovery;
mod error;
mod snapshots;

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use scaleway_rs::ScalewayApi;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::config::ScalewayConfig;
use crate::provider::{ProviderFuture, SnapshotProvider};
use crate::snapshot::SnapshotRecord;
use crate::tag::TagFilter;
use crate::volume::{Volume, VolumeDiscovery};

pub use error::ScalewayProviderError;
pub use snapshots::{CREATOR_TAG, map_status, origin_tag, snapshot_name, snapshot_tags};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SCALEWAY_API_BASE: &str = "https://api.scaleway.com";
const PAGE_SIZE: u32 = 100;

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Snapshot provider and volume discovery backed by the Scaleway APIs.
#[derive(Clone)]
pub struct ScalewayProvider {
    api: ScalewayApi,
    config: ScalewayConfig,
    scope: TagFilter,
    run_id: Option<Uuid>,
}

impl ScalewayProvider {
    /// Constructs a provider from configuration.
    ///
    /// `scope` is the instance tag of the run. Snapshots are tagged with it
    /// and listings ignore snapshots taken for any other tag.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayProviderError::Config`] when the provided
    /// configuration fails validation.
    pub fn new(config: ScalewayConfig, scope: TagFilter) -> Result<Self, ScalewayProviderError> {
        config.validate()?;
        debug!(
            zone = %config.default_zone,
            project_id = %config.default_project_id,
            %scope,
            access_key = config.access_key.as_deref().unwrap_or("unset"),
            "configured Scaleway provider"
        );
        Ok(Self {
            api: ScalewayApi::new(&config.secret_key),
            config,
            scope,
            run_id: None,
        })
    }

    /// Tags every created snapshot with `run=<run_id>`.
    #[must_use]
    pub const fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    fn zone(&self) -> &str {
        &self.config.default_zone
    }

    fn project_id(&self) -> &str {
        &self.config.default_project_id
    }

    /// Sends a request to `path` (relative to the API root) and decodes the
    /// JSON response.
    async fn call<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ScalewayProviderError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let bytes = self.send(method, path, query, body).await?;
        serde_json::from_slice(&bytes).map_err(|err| ScalewayProviderError::Decode {
            endpoint: path.to_owned(),
            message: err.to_string(),
        })
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Vec<u8>, ScalewayProviderError>
    where
        B: Serialize + Sync,
    {
        let url = format!("{SCALEWAY_API_BASE}{path}");
        let mut request = HTTP_CLIENT
            .request(method, &url)
            .header("X-Auth-Token", &self.config.secret_key)
            .query(query);
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let transport = |err: reqwest::Error| ScalewayProviderError::Transport {
            endpoint: path.to_owned(),
            message: err.to_string(),
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;

        if status.is_success() {
            return Ok(bytes.to_vec());
        }
        Err(ScalewayProviderError::Status {
            endpoint: path.to_owned(),
            status: status.as_u16(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

impl SnapshotProvider for ScalewayProvider {
    type Error = ScalewayProviderError;

    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Volume,
    ) -> ProviderFuture<'a, SnapshotRecord, Self::Error> {
        Box::pin(async move { self.create_block_snapshot(volume).await })
    }

    fn list_snapshots<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> ProviderFuture<'a, Vec<SnapshotRecord>, Self::Error> {
        Box::pin(async move { self.list_block_snapshots(volume_id).await })
    }

    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            match self.delete_block_snapshot(snapshot_id).await {
                Err(ScalewayProviderError::Status { status, .. })
                    if status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    debug!(%snapshot_id, "snapshot already gone");
                    Ok(())
                }
                other => other,
            }
        })
    }
}

impl VolumeDiscovery for ScalewayProvider {
    type Error = ScalewayProviderError;

    fn discover<'a>(
        &'a self,
        filter: &'a TagFilter,
    ) -> ProviderFuture<'a, Vec<Volume>, Self::Error> {
        Box::pin(async move { self.discover_tagged_volumes(filter).await })
    }
}
