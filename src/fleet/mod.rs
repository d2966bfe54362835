//! Fleet-wide rotation across every discovered volume.
//!
//! Volumes are independent, so the coordinator runs a bounded number of
//! rotations at once and reassembles the results in input order. One volume
//! failing, or even panicking, never stops the others.

use std::any::Any;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::policy::RetentionPolicy;
use crate::provider::SnapshotProvider;
use crate::rotation::{RotationFailure, RotationResult, VolumeRotator};
use crate::volume::Volume;

/// Number of volumes rotated concurrently when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Results of one fleet run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FleetReport {
    /// Identifier of this run, also used to tag created snapshots.
    pub run_id: Uuid,
    /// Retention count applied to every volume.
    pub max_snapshots: u32,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last rotation finished.
    pub finished_at: DateTime<Utc>,
    /// Per-volume results, in the order the volumes were supplied.
    pub results: Vec<RotationResult>,
}

impl FleetReport {
    /// Returns true when every volume rotated without failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.iter().all(RotationResult::is_success)
    }

    /// Results that recorded at least one failure.
    pub fn failures(&self) -> impl Iterator<Item = &RotationResult> {
        self.results.iter().filter(|result| !result.is_success())
    }

    /// Total number of snapshots deleted across the fleet.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.results.iter().map(|result| result.deleted.len()).sum()
    }

    /// Total number of snapshots created across the fleet.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.created.is_some())
            .count()
    }
}

/// Drives one [`VolumeRotator`] per volume.
#[derive(Debug)]
pub struct FleetCoordinator<P> {
    rotator: VolumeRotator<P>,
    concurrency: NonZeroUsize,
    run_id: Uuid,
}

impl<P: SnapshotProvider> FleetCoordinator<P> {
    /// Creates a coordinator for a validated policy.
    ///
    /// Invalid retention counts are rejected when the [`RetentionPolicy`] is
    /// built, so a misconfigured run never reaches the provider.
    #[must_use]
    pub fn new(provider: Arc<P>, policy: RetentionPolicy) -> Self {
        Self {
            rotator: VolumeRotator::new(provider, policy),
            concurrency: NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            run_id: Uuid::new_v4(),
        }
    }

    /// Sets how many volumes are rotated at the same time.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enables or disables the post-deletion listing check.
    #[must_use]
    pub fn with_deletion_check(mut self, enabled: bool) -> Self {
        self.rotator = self.rotator.with_deletion_check(enabled);
        self
    }

    /// Uses a caller-provided run identifier.
    #[must_use]
    pub const fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Identifier reported for this run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Rotates every volume.
    pub async fn run(&self, volumes: &[Volume]) -> FleetReport {
        self.run_until_cancelled(volumes, &CancellationToken::new())
            .await
    }

    /// Rotates every volume until `cancel` fires.
    ///
    /// After cancellation no further rotation starts. Rotations already in
    /// flight run to completion so no volume is left half rotated. Volumes
    /// that never started are reported as [`RotationFailure::Cancelled`].
    pub async fn run_until_cancelled(
        &self,
        volumes: &[Volume],
        cancel: &CancellationToken,
    ) -> FleetReport {
        let started_at = Utc::now();
        info!(
            run_id = %self.run_id,
            volumes = volumes.len(),
            max_snapshots = self.rotator.policy().max_snapshots().get(),
            concurrency = self.concurrency.get(),
            "starting rotation run"
        );

        let mut finished: BTreeMap<usize, RotationResult> = stream::iter(volumes.iter().enumerate())
            .take_while(|_| std::future::ready(!cancel.is_cancelled()))
            .map(|(index, volume)| async move { (index, self.rotate_isolated(volume).await) })
            .buffer_unordered(self.concurrency.get())
            .collect()
            .await;

        let results: Vec<RotationResult> = volumes
            .iter()
            .enumerate()
            .map(|(index, volume)| {
                finished.remove(&index).unwrap_or_else(|| {
                    warn!(volume_id = %volume.id, "run cancelled before rotating volume");
                    RotationResult::failed(volume.id.clone(), RotationFailure::Cancelled)
                })
            })
            .collect();

        let report = FleetReport {
            run_id: self.run_id,
            max_snapshots: self.rotator.policy().max_snapshots().get(),
            started_at,
            finished_at: Utc::now(),
            results,
        };
        info!(
            run_id = %self.run_id,
            created = report.created_count(),
            deleted = report.deleted_count(),
            failed = report.failures().count(),
            "rotation run finished"
        );
        report
    }

    async fn rotate_isolated(&self, volume: &Volume) -> RotationResult {
        match AssertUnwindSafe(self.rotator.rotate(volume))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(volume_id = %volume.id, %message, "rotation panicked");
                RotationResult::failed(volume.id.clone(), RotationFailure::Aborted { message })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"))
}
