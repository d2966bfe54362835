//! Core library for the snapwarden snapshot rotation tool.
//!
//! The crate snapshots every volume attached to tagged instances and prunes
//! the oldest snapshots beyond a retention count. Provider access sits behind
//! the [`provider::SnapshotProvider`] and [`volume::VolumeDiscovery`] traits,
//! with a Scaleway implementation in [`scaleway`]. The retention decision in
//! [`policy`] is pure, [`rotation`] sequences one volume, and [`fleet`] runs
//! many volumes with bounded concurrency.

pub mod config;
pub mod fleet;
pub mod logging;
pub mod policy;
pub mod provider;
pub mod report;
pub mod rotation;
pub mod scaleway;
pub mod snapshot;
pub mod tag;
pub mod test_support;
pub mod volume;

pub use config::{ConfigError, RotationConfig, RotationSettings, ScalewayConfig};
pub use fleet::{FleetCoordinator, FleetReport};
pub use policy::{RetentionPlan, RetentionPolicy, evaluate};
pub use provider::{ProviderFuture, SnapshotProvider};
pub use report::ReportError;
pub use rotation::{ConsistencyWarning, RotationFailure, RotationResult, VolumeRotator};
pub use scaleway::{ScalewayProvider, ScalewayProviderError};
pub use snapshot::{SnapshotRecord, SnapshotState};
pub use tag::{TagError, TagFilter};
pub use volume::{Volume, VolumeDiscovery};
