//! Retention policy and the evaluator that partitions snapshots into the ones
//! to keep and the ones to delete.
//!
//! Evaluation is pure: it never talks to a provider and never mutates its
//! inputs, so the same snapshots and policy always produce the same plan.

use std::collections::HashSet;
use std::num::NonZeroU32;

use serde::Serialize;
use thiserror::Error;

use crate::snapshot::SnapshotRecord;

/// Retention count used when nothing else is configured.
pub const DEFAULT_MAX_SNAPSHOTS: u32 = 14;

/// Errors raised when building a retention policy.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PolicyError {
    /// The retention count is zero or negative.
    #[error("retention count must be at least 1, got {value}")]
    InvalidRetention {
        /// Rejected value.
        value: i64,
    },
}

/// Maximum number of snapshots kept per volume.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct RetentionPolicy {
    max_snapshots: NonZeroU32,
}

impl RetentionPolicy {
    /// Builds a policy keeping at most `max_snapshots` snapshots per volume.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRetention`] when `max_snapshots` is zero.
    pub fn new(max_snapshots: u32) -> Result<Self, PolicyError> {
        NonZeroU32::new(max_snapshots)
            .map(|count| Self {
                max_snapshots: count,
            })
            .ok_or(PolicyError::InvalidRetention {
                value: i64::from(max_snapshots),
            })
    }

    /// Configured retention count.
    #[must_use]
    pub const fn max_snapshots(&self) -> NonZeroU32 {
        self.max_snapshots
    }

    fn limit(&self) -> usize {
        usize::try_from(self.max_snapshots.get()).unwrap_or(usize::MAX)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_snapshots: NonZeroU32::new(DEFAULT_MAX_SNAPSHOTS).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl TryFrom<i64> for RetentionPolicy {
    type Error = PolicyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let count = u32::try_from(value).map_err(|_| PolicyError::InvalidRetention { value })?;
        Self::new(count)
    }
}

/// Outcome of evaluating a volume's snapshots against a policy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RetentionPlan {
    /// Snapshots that survive, newest first.
    pub keep: Vec<SnapshotRecord>,
    /// Snapshots to delete, oldest first.
    pub delete: Vec<SnapshotRecord>,
}

impl RetentionPlan {
    /// Identifiers of the surviving snapshots, newest first.
    #[must_use]
    pub fn keep_ids(&self) -> Vec<String> {
        self.keep.iter().map(|record| record.id.clone()).collect()
    }

    /// Identifiers of the snapshots to delete, oldest first.
    #[must_use]
    pub fn delete_ids(&self) -> Vec<String> {
        self.delete.iter().map(|record| record.id.clone()).collect()
    }
}

/// Partitions `existing` plus an optional freshly created snapshot.
///
/// `new_record` is merged into the working set, replacing any listed record
/// with the same id, and always survives: it takes one of the policy's slots
/// and the remaining slots go to the most recent other records. Records are
/// ranked with [`SnapshotRecord::recency_cmp`]; duplicate ids in `existing`
/// are collapsed to their first occurrence. When `new_record` is absent the
/// existing set is still trimmed to the policy.
#[must_use]
pub fn evaluate(
    existing: &[SnapshotRecord],
    new_record: Option<&SnapshotRecord>,
    policy: &RetentionPolicy,
) -> RetentionPlan {
    let mut seen: HashSet<&str> = HashSet::new();
    if let Some(record) = new_record {
        seen.insert(record.id.as_str());
    }
    let mut others: Vec<&SnapshotRecord> = existing
        .iter()
        .filter(|record| seen.insert(record.id.as_str()))
        .collect();
    others.sort_by(|lhs, rhs| lhs.recency_cmp(rhs));

    let reserved = usize::from(new_record.is_some());
    let slots = policy.limit().saturating_sub(reserved).min(others.len());
    let (retained, expired) = others.split_at(slots);

    let mut keep: Vec<SnapshotRecord> = retained
        .iter()
        .map(|record| (*record).clone())
        .chain(new_record.cloned())
        .collect();
    keep.sort_by(SnapshotRecord::recency_cmp);

    let delete = expired.iter().rev().map(|record| (*record).clone()).collect();

    RetentionPlan { keep, delete }
}

/// Evaluates against a raw retention count, validating it first.
///
/// # Errors
///
/// Returns [`PolicyError::InvalidRetention`] when `max_snapshots` is below 1;
/// nothing is classified in that case.
pub fn evaluate_with_limit(
    existing: &[SnapshotRecord],
    new_record: Option<&SnapshotRecord>,
    max_snapshots: i64,
) -> Result<RetentionPlan, PolicyError> {
    let policy = RetentionPolicy::try_from(max_snapshots)?;
    Ok(evaluate(existing, new_record, &policy))
}
