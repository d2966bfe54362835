//! Provider abstraction for creating, listing, and deleting snapshots.

use std::future::Future;
use std::pin::Pin;

use crate::snapshot::SnapshotRecord;
use crate::volume::Volume;

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Snapshot operations the rotation engine needs from a cloud provider.
///
/// Implementations are shared between concurrent volume rotations, so they
/// must be callable from several tasks at once. Rate limiting and retries are
/// the implementation's concern.
pub trait SnapshotProvider: Send + Sync {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Requests a new snapshot of `volume`.
    ///
    /// The returned record describes the accepted request; the snapshot may
    /// still be [`Pending`](crate::snapshot::SnapshotState::Pending).
    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Volume,
    ) -> ProviderFuture<'a, SnapshotRecord, Self::Error>;

    /// Lists the managed snapshots of the given volume, in no particular order.
    fn list_snapshots<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> ProviderFuture<'a, Vec<SnapshotRecord>, Self::Error>;

    /// Deletes a snapshot by identifier.
    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ProviderFuture<'a, (), Self::Error>;
}
