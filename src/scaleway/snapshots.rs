//! Block Storage snapshot helpers for the Scaleway provider.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::snapshot::{SnapshotRecord, SnapshotState};
use crate::tag::TagFilter;
use crate::volume::Volume;

use super::{PAGE_SIZE, ScalewayProvider, ScalewayProviderError};

/// Tag marking snapshots managed by this tool.
pub const CREATOR_TAG: &str = "creator=snapwarden";

const BLOCK_API_ZONES: &str = "/block/v1alpha1/zones";
const NAME_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Serialize)]
struct CreateSnapshotRequest<'a> {
    volume_id: &'a str,
    name: String,
    project_id: &'a str,
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BlockSnapshot {
    id: String,
    #[serde(default)]
    parent_volume: Option<ParentVolume>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ParentVolume {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListSnapshotsResponse {
    snapshots: Vec<BlockSnapshot>,
    #[serde(default)]
    total_count: u64,
}

impl BlockSnapshot {
    /// Created by this tool for the instance tag rendered as `origin`.
    fn is_managed(&self, origin: &str) -> bool {
        self.tags.iter().any(|tag| tag == CREATOR_TAG)
            && self.tags.iter().any(|tag| tag == origin)
    }

    fn into_record(
        self,
        volume_id: &str,
        fallback_time: Option<DateTime<Utc>>,
    ) -> Result<SnapshotRecord, ScalewayProviderError> {
        let Some(created_at) = self.created_at.or(fallback_time) else {
            return Err(ScalewayProviderError::MissingTimestamp {
                snapshot_id: self.id,
            });
        };
        let parent = self
            .parent_volume
            .map_or_else(|| volume_id.to_owned(), |volume| volume.id);
        Ok(SnapshotRecord::new(
            self.id,
            parent,
            created_at,
            map_status(&self.status),
        ))
    }
}

/// Maps a Block Storage snapshot status onto [`SnapshotState`].
///
/// `available` and `in_use` snapshots are complete, `error` is failed, and
/// every transient or unknown status counts as pending.
#[must_use]
pub fn map_status(status: &str) -> SnapshotState {
    match status {
        "available" | "in_use" => SnapshotState::Completed,
        "error" => SnapshotState::Failed,
        _ => SnapshotState::Pending,
    }
}

/// Descriptive snapshot name: owner, attachment slot, and creation minute.
#[must_use]
pub fn snapshot_name(volume: &Volume, now: DateTime<Utc>) -> String {
    format!(
        "{} {} {}",
        volume.owner_label(),
        volume.device,
        now.format(NAME_TIME_FORMAT)
    )
}

/// Tag recording which instance tag selected the snapshot's volume.
///
/// Listings only return snapshots carrying the origin tag of the current
/// run, so runs with different tags keep separate retention counts.
#[must_use]
pub fn origin_tag(scope: &TagFilter) -> String {
    format!("origin-{}={}", scope.key(), scope.value())
}

/// Tags applied to a new snapshot.
#[must_use]
pub fn snapshot_tags(volume: &Volume, scope: &TagFilter, run_id: Option<Uuid>) -> Vec<String> {
    let mut tags = vec![
        CREATOR_TAG.to_owned(),
        format!("origin-instance={}", volume.instance_id),
        origin_tag(scope),
    ];
    if let Some(run) = run_id {
        tags.push(format!("run={run}"));
    }
    tags
}

fn has_more_pages(seen: usize, fetched: usize, total_count: u64) -> bool {
    fetched > 0 && u64::try_from(seen).unwrap_or(u64::MAX) < total_count
}

impl ScalewayProvider {
    fn snapshots_path(&self) -> String {
        format!("{BLOCK_API_ZONES}/{}/snapshots", self.zone())
    }

    pub(super) async fn create_block_snapshot(
        &self,
        volume: &Volume,
    ) -> Result<SnapshotRecord, ScalewayProviderError> {
        let requested_at = Utc::now();
        let payload = CreateSnapshotRequest {
            volume_id: &volume.id,
            name: snapshot_name(volume, requested_at),
            project_id: self.project_id(),
            tags: snapshot_tags(volume, &self.scope, self.run_id),
        };
        let snapshot: BlockSnapshot = self
            .call(Method::POST, &self.snapshots_path(), &[], Some(&payload))
            .await?;
        debug!(snapshot_id = %snapshot.id, status = %snapshot.status, "snapshot accepted");
        snapshot.into_record(&volume.id, Some(requested_at))
    }

    pub(super) async fn list_block_snapshots(
        &self,
        volume_id: &str,
    ) -> Result<Vec<SnapshotRecord>, ScalewayProviderError> {
        let path = self.snapshots_path();
        let origin = origin_tag(&self.scope);
        let mut records = Vec::new();
        let mut seen = 0_usize;
        let mut page = 1_u32;
        loop {
            let query = [
                ("volume_id", volume_id.to_owned()),
                ("project_id", self.project_id().to_owned()),
                ("page", page.to_string()),
                ("page_size", PAGE_SIZE.to_string()),
            ];
            let response: ListSnapshotsResponse = self
                .call::<_, ()>(Method::GET, &path, &query, None)
                .await?;
            let fetched = response.snapshots.len();
            seen += fetched;
            for snapshot in response.snapshots {
                if snapshot.is_managed(&origin) {
                    records.push(snapshot.into_record(volume_id, None)?);
                }
            }
            if !has_more_pages(seen, fetched, response.total_count) {
                break;
            }
            page = page.saturating_add(1);
        }
        debug!(%volume_id, listed = seen, managed = records.len(), "listed snapshots");
        Ok(records)
    }

    pub(super) async fn delete_block_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<(), ScalewayProviderError> {
        let path = format!("{}/{snapshot_id}", self.snapshots_path());
        self.send::<()>(Method::DELETE, &path, &[], None)
            .await
            .map(|_| ())
    }
}
