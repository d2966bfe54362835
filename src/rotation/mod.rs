//! Per-volume rotation: create a snapshot, list what exists, evaluate the
//! retention policy, and delete the excess.
//!
//! [`VolumeRotator::rotate`] never fails as a whole. Every problem is carried
//! in the returned [`RotationResult`] so a fleet run can keep going.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::policy::{RetentionPolicy, evaluate};
use crate::provider::SnapshotProvider;
use crate::snapshot::SnapshotRecord;
use crate::volume::Volume;

/// Reason a volume's rotation stopped before completing.
#[derive(Clone, Debug, Eq, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RotationFailure {
    /// Existing snapshots could not be listed, so nothing was deleted.
    #[error("listing snapshots failed: {message}")]
    Listing {
        /// Provider error message.
        message: String,
        /// Snapshot created earlier in the same rotation, if any.
        created_snapshot_id: Option<String>,
    },
    /// The rotation panicked and was abandoned.
    #[error("rotation aborted: {message}")]
    Aborted {
        /// Panic payload, when it was a string.
        message: String,
    },
    /// The run was cancelled before this volume was started.
    #[error("rotation skipped: run cancelled")]
    Cancelled,
}

/// Non-fatal observation made after deletions.
#[derive(Clone, Debug, Eq, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyWarning {
    /// A deleted snapshot is still listed by the provider.
    #[error("snapshot {snapshot_id} still listed after deletion")]
    StillListed {
        /// Identifier of the lingering snapshot.
        snapshot_id: String,
    },
    /// The follow-up listing used to check deletions failed.
    #[error("could not verify deletions: {message}")]
    CheckFailed {
        /// Provider error message.
        message: String,
    },
}

/// Outcome of rotating one volume.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RotationResult {
    /// Volume the rotation ran against.
    pub volume_id: String,
    /// Snapshot created in this rotation.
    pub created: Option<SnapshotRecord>,
    /// Provider message when snapshot creation failed.
    pub creation_failure: Option<String>,
    /// Snapshot ids deleted, in deletion order (oldest first).
    pub deleted: Vec<String>,
    /// Snapshot ids whose deletion failed, with the provider message.
    pub deletion_failures: BTreeMap<String, String>,
    /// Snapshot ids kept by the policy, newest first.
    pub survived: Vec<String>,
    /// Top-level failure that stopped the rotation.
    pub failure: Option<RotationFailure>,
    /// Non-fatal consistency warnings.
    pub warnings: Vec<ConsistencyWarning>,
}

impl RotationResult {
    /// Creates an empty result for `volume_id`.
    #[must_use]
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            created: None,
            creation_failure: None,
            deleted: Vec::new(),
            deletion_failures: BTreeMap::new(),
            survived: Vec::new(),
            failure: None,
            warnings: Vec::new(),
        }
    }

    /// Creates a result recording a top-level failure.
    #[must_use]
    pub fn failed(volume_id: impl Into<String>, failure: RotationFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(volume_id)
        }
    }

    /// Returns true when creation, listing, and every deletion succeeded.
    ///
    /// Consistency warnings do not count as failures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
            && self.creation_failure.is_none()
            && self.deletion_failures.is_empty()
    }

    /// Human-readable descriptions of every failure in this result.
    #[must_use]
    pub fn failure_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if let Some(failure) = &self.failure {
            messages.push(failure.to_string());
        }
        if let Some(message) = &self.creation_failure {
            messages.push(format!("snapshot creation failed: {message}"));
        }
        for (snapshot_id, message) in &self.deletion_failures {
            messages.push(format!("deleting {snapshot_id} failed: {message}"));
        }
        messages
    }
}

/// Runs the create → list → evaluate → delete cycle for single volumes.
#[derive(Debug)]
pub struct VolumeRotator<P> {
    provider: Arc<P>,
    policy: RetentionPolicy,
    verify_deletions: bool,
}

impl<P> Clone for VolumeRotator<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            policy: self.policy,
            verify_deletions: self.verify_deletions,
        }
    }
}

impl<P: SnapshotProvider> VolumeRotator<P> {
    /// Creates a rotator using a shared provider and a validated policy.
    ///
    /// Deletions are checked with a follow-up listing unless disabled with
    /// [`Self::with_deletion_check`].
    #[must_use]
    pub const fn new(provider: Arc<P>, policy: RetentionPolicy) -> Self {
        Self {
            provider,
            policy,
            verify_deletions: true,
        }
    }

    /// Enables or disables the post-deletion listing check.
    #[must_use]
    pub const fn with_deletion_check(mut self, enabled: bool) -> Self {
        self.verify_deletions = enabled;
        self
    }

    /// Policy applied to every volume.
    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Rotates one volume.
    ///
    /// A failed creation does not stop cleanup. A failed listing stops the
    /// rotation before any deletion. Deletion failures are isolated per
    /// snapshot.
    pub async fn rotate(&self, volume: &Volume) -> RotationResult {
        let span = info_span!(
            "rotate",
            volume_id = %volume.id,
            instance_id = %volume.instance_id
        );
        self.rotate_volume(volume).instrument(span).await
    }

    async fn rotate_volume(&self, volume: &Volume) -> RotationResult {
        let mut result = RotationResult::new(volume.id.clone());

        let created = match self.provider.create_snapshot(volume).await {
            Ok(record) => {
                info!(snapshot_id = %record.id, "created snapshot");
                Some(record)
            }
            Err(err) => {
                error!(error = %err, "snapshot creation failed, continuing with cleanup");
                result.creation_failure = Some(err.to_string());
                None
            }
        };

        let existing = match self.provider.list_snapshots(&volume.id).await {
            Ok(records) => Self::owned_by(volume, records),
            Err(err) => {
                error!(error = %err, "listing snapshots failed, skipping deletions");
                result.failure = Some(RotationFailure::Listing {
                    message: err.to_string(),
                    created_snapshot_id: created.map(|record| record.id),
                });
                return result;
            }
        };

        let plan = evaluate(&existing, created.as_ref(), &self.policy);
        debug!(
            keep = plan.keep.len(),
            delete = plan.delete.len(),
            max_snapshots = self.policy.max_snapshots().get(),
            "evaluated retention"
        );
        result.survived = plan.keep_ids();

        for record in &plan.delete {
            match self.provider.delete_snapshot(&record.id).await {
                Ok(()) => {
                    info!(
                        snapshot_id = %record.id,
                        created_at = %record.created_at,
                        "deleted snapshot"
                    );
                    result.deleted.push(record.id.clone());
                }
                Err(err) => {
                    error!(
                        snapshot_id = %record.id,
                        created_at = %record.created_at,
                        error = %err,
                        "deleting snapshot failed"
                    );
                    result
                        .deletion_failures
                        .insert(record.id.clone(), err.to_string());
                }
            }
        }

        if self.verify_deletions && !result.deleted.is_empty() {
            result.warnings = self.check_deletions(&volume.id, &result.deleted).await;
        }

        result.created = created;
        result
    }

    fn owned_by(volume: &Volume, records: Vec<SnapshotRecord>) -> Vec<SnapshotRecord> {
        let listed = records.len();
        let owned: Vec<SnapshotRecord> = records
            .into_iter()
            .filter(|record| record.volume_id == volume.id)
            .collect();
        if owned.len() != listed {
            warn!(
                ignored = listed - owned.len(),
                "provider listed snapshots of other volumes, ignoring them"
            );
        }
        owned
    }

    async fn check_deletions(&self, volume_id: &str, deleted: &[String]) -> Vec<ConsistencyWarning> {
        match self.provider.list_snapshots(volume_id).await {
            Ok(records) => deleted
                .iter()
                .filter(|snapshot_id| records.iter().any(|record| &record.id == *snapshot_id))
                .map(|snapshot_id| {
                    warn!(%snapshot_id, "deleted snapshot still listed, provider listing may lag");
                    ConsistencyWarning::StillListed {
                        snapshot_id: snapshot_id.clone(),
                    }
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "could not verify deletions");
                vec![ConsistencyWarning::CheckFailed {
                    message: err.to_string(),
                }]
            }
        }
    }
}
