//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::provider::{ProviderFuture, SnapshotProvider};
use crate::snapshot::{SnapshotRecord, SnapshotState};
use crate::tag::TagFilter;
use crate::volume::{Volume, VolumeDiscovery};

static ENV_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

const BASE_EPOCH_SECONDS: i64 = 1_700_000_000;
const CLOCK_START_OFFSET: i64 = 1_000_000;

/// Returns a fixed timestamp `offset_seconds` after an arbitrary epoch.
#[must_use]
pub fn fixed_time(offset_seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_EPOCH_SECONDS + offset_seconds, 0)
        .single()
        .unwrap_or_default()
}

/// Builds a completed snapshot record created at `fixed_time(offset_seconds)`.
#[must_use]
pub fn completed_snapshot(id: &str, volume_id: &str, offset_seconds: i64) -> SnapshotRecord {
    SnapshotRecord::new(
        id,
        volume_id,
        fixed_time(offset_seconds),
        SnapshotState::Completed,
    )
}

/// Provider call recorded by [`ScriptedProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderCall {
    /// `create_snapshot` for a volume id.
    Create(String),
    /// `list_snapshots` for a volume id.
    List(String),
    /// `delete_snapshot` for a snapshot id.
    Delete(String),
    /// `discover` for a rendered tag.
    Discover(String),
}

/// Errors produced by [`ScriptedProvider`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedProviderError {
    /// Creation was scripted to fail.
    #[error("scripted creation failure for volume {volume_id}")]
    Create {
        /// Volume the snapshot was requested for.
        volume_id: String,
    },
    /// Listing was scripted to fail.
    #[error("scripted listing failure for volume {volume_id}")]
    List {
        /// Volume whose snapshots were listed.
        volume_id: String,
    },
    /// Deletion was scripted to fail.
    #[error("scripted deletion failure for snapshot {snapshot_id}")]
    Delete {
        /// Snapshot that could not be deleted.
        snapshot_id: String,
    },
    /// Deletion targeted an unknown snapshot.
    #[error("snapshot {snapshot_id} not found")]
    NotFound {
        /// Unknown snapshot id.
        snapshot_id: String,
    },
}

#[derive(Debug, Default)]
struct ScriptState {
    volumes: Vec<Volume>,
    snapshots: BTreeMap<String, Vec<SnapshotRecord>>,
    failing_creates: HashSet<String>,
    list_budgets: HashMap<String, usize>,
    panicking_lists: HashSet<String>,
    failing_deletes: HashSet<String>,
    lingering: HashSet<String>,
    ghosts: Vec<SnapshotRecord>,
    hidden: HashSet<String>,
    hide_created: bool,
    cancel_on_create: HashMap<String, CancellationToken>,
    next_serial: i64,
    calls: Vec<ProviderCall>,
}

/// In-memory provider with scripted failures.
///
/// Clones share state, so a test can keep a handle for assertions while the
/// code under test owns another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a volume returned by discovery.
    pub fn add_volume(&self, volume: Volume) {
        self.state().volumes.push(volume);
    }

    /// Seeds an existing snapshot.
    pub fn add_snapshot(&self, record: SnapshotRecord) {
        self.state()
            .snapshots
            .entry(record.volume_id.clone())
            .or_default()
            .push(record);
    }

    /// Makes snapshot creation fail for a volume.
    pub fn fail_creation(&self, volume_id: &str) {
        self.state().failing_creates.insert(volume_id.to_owned());
    }

    /// Makes every listing of a volume fail.
    pub fn fail_listing(&self, volume_id: &str) {
        self.fail_listing_after(volume_id, 0);
    }

    /// Lets `successes` listings of a volume succeed, then fails the rest.
    pub fn fail_listing_after(&self, volume_id: &str, successes: usize) {
        self.state()
            .list_budgets
            .insert(volume_id.to_owned(), successes);
    }

    /// Makes listing a volume panic.
    pub fn panic_on_listing(&self, volume_id: &str) {
        self.state().panicking_lists.insert(volume_id.to_owned());
    }

    /// Makes deleting a snapshot fail.
    pub fn fail_deletion(&self, snapshot_id: &str) {
        self.state().failing_deletes.insert(snapshot_id.to_owned());
    }

    /// Keeps a snapshot in listings after it was deleted.
    pub fn linger_after_deletion(&self, snapshot_id: &str) {
        self.state().lingering.insert(snapshot_id.to_owned());
    }

    /// Hides newly created snapshots from listings.
    pub fn hide_created_snapshots(&self) {
        self.state().hide_created = true;
    }

    /// Cancels `token` when a snapshot of `volume_id` is requested.
    pub fn cancel_on_create(&self, volume_id: &str, token: CancellationToken) {
        self.state()
            .cancel_on_create
            .insert(volume_id.to_owned(), token);
    }

    /// Snapshots currently stored for a volume, in insertion order.
    #[must_use]
    pub fn snapshots(&self, volume_id: &str) -> Vec<SnapshotRecord> {
        self.state()
            .snapshots
            .get(volume_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    /// Deletion calls recorded so far, in order.
    #[must_use]
    pub fn deletions(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProviderCall::Delete(snapshot_id) => Some(snapshot_id.clone()),
                _ => None,
            })
            .collect()
    }

    fn create(&self, volume: &Volume) -> Result<SnapshotRecord, ScriptedProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Create(volume.id.clone()));
        if let Some(token) = state.cancel_on_create.get(&volume.id) {
            token.cancel();
        }
        if state.failing_creates.contains(&volume.id) {
            return Err(ScriptedProviderError::Create {
                volume_id: volume.id.clone(),
            });
        }
        state.next_serial += 1;
        let serial = state.next_serial;
        let record = SnapshotRecord::new(
            format!("{}-snap-{serial:03}", volume.id),
            volume.id.clone(),
            fixed_time(CLOCK_START_OFFSET) + Duration::seconds(serial),
            SnapshotState::Pending,
        );
        if state.hide_created {
            state.hidden.insert(record.id.clone());
        }
        state
            .snapshots
            .entry(volume.id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn list(&self, volume_id: &str) -> Result<Vec<SnapshotRecord>, ScriptedProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::List(volume_id.to_owned()));
        if state.panicking_lists.contains(volume_id) {
            drop(state);
            panic!("scripted panic while listing {volume_id}");
        }
        if let Some(budget) = state.list_budgets.get_mut(volume_id) {
            if *budget == 0 {
                return Err(ScriptedProviderError::List {
                    volume_id: volume_id.to_owned(),
                });
            }
            *budget -= 1;
        }
        let mut records: Vec<SnapshotRecord> = state
            .snapshots
            .get(volume_id)
            .into_iter()
            .flatten()
            .chain(state.ghosts.iter())
            .filter(|record| record.volume_id == volume_id && !state.hidden.contains(&record.id))
            .cloned()
            .collect();
        // Listings come back in no particular order.
        records.reverse();
        Ok(records)
    }

    fn delete(&self, snapshot_id: &str) -> Result<(), ScriptedProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Delete(snapshot_id.to_owned()));
        if state.failing_deletes.contains(snapshot_id) {
            return Err(ScriptedProviderError::Delete {
                snapshot_id: snapshot_id.to_owned(),
            });
        }
        let mut removed = Vec::new();
        for records in state.snapshots.values_mut() {
            removed.extend(records.iter().filter(|record| record.id == snapshot_id).cloned());
            records.retain(|record| record.id != snapshot_id);
        }
        if removed.is_empty() {
            return Err(ScriptedProviderError::NotFound {
                snapshot_id: snapshot_id.to_owned(),
            });
        }
        if state.lingering.contains(snapshot_id) {
            state.ghosts.extend(removed);
        }
        Ok(())
    }
}

impl SnapshotProvider for ScriptedProvider {
    type Error = ScriptedProviderError;

    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Volume,
    ) -> ProviderFuture<'a, SnapshotRecord, Self::Error> {
        Box::pin(async move { self.create(volume) })
    }

    fn list_snapshots<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> ProviderFuture<'a, Vec<SnapshotRecord>, Self::Error> {
        Box::pin(async move { self.list(volume_id) })
    }

    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move { self.delete(snapshot_id) })
    }
}

impl VolumeDiscovery for ScriptedProvider {
    type Error = ScriptedProviderError;

    fn discover<'a>(
        &'a self,
        filter: &'a TagFilter,
    ) -> ProviderFuture<'a, Vec<Volume>, Self::Error> {
        Box::pin(async move {
            let tag = filter.provider_tag();
            let mut state = self.state();
            state.calls.push(ProviderCall::Discover(tag.clone()));
            Ok(state
                .volumes
                .iter()
                .filter(|volume| volume.tags.contains(&tag))
                .cloned()
                .collect())
        })
    }
}

/// Holds the environment lock and restores touched variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: tokio::sync::MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Removes variables while holding a global mutex.
    pub async fn remove_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(keys.len());
        for key in keys {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe { env::remove_var(key) };
        }
        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
