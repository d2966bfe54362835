//! Snapshot records as observed from a provider.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-side completion status of a snapshot at observation time.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotState {
    /// Creation was accepted but the provider has not finished copying data.
    Pending,
    /// The snapshot is complete and usable.
    Completed,
    /// The provider reported the snapshot as failed.
    Failed,
}

/// One point-in-time snapshot of a volume.
///
/// Records are never mutated in place; observing a snapshot again yields a
/// new value with the refreshed [`SnapshotState`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SnapshotRecord {
    /// Provider-assigned identifier, unique within an account and zone.
    pub id: String,
    /// Identifier of the volume the snapshot was taken from.
    pub volume_id: String,
    /// Creation timestamp reported by the provider.
    pub created_at: DateTime<Utc>,
    /// Completion status at observation time.
    pub state: SnapshotState,
}

impl SnapshotRecord {
    /// Creates a record, trimming identifier whitespace.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        volume_id: impl Into<String>,
        created_at: DateTime<Utc>,
        state: SnapshotState,
    ) -> Self {
        Self {
            id: id.into().trim().to_owned(),
            volume_id: volume_id.into().trim().to_owned(),
            created_at,
            state,
        }
    }

    /// Compares two records by recency, newest first.
    ///
    /// Records are ordered by `created_at` descending. Equal timestamps fall
    /// back to the identifier, where the lexicographically greater id counts
    /// as newer. The result is a total order, so sorting with it never
    /// depends on the order a provider returned records in.
    #[must_use]
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}
