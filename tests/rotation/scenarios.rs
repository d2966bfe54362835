//! BDD scenarios for fleet rotation through the `snapwarden` binary.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RotationContext, rotation_context};

#[scenario(
    path = "tests/features/rotation.feature",
    name = "Rotate every tagged volume"
)]
fn scenario_rotate_tagged_volumes(rotation_context: RotationContext) {
    let _ = rotation_context;
}

#[scenario(
    path = "tests/features/rotation.feature",
    name = "Creation failure still trims stale snapshots"
)]
fn scenario_creation_failure(rotation_context: RotationContext) {
    let _ = rotation_context;
}

#[scenario(
    path = "tests/features/rotation.feature",
    name = "Listing failure skips deletions for that volume"
)]
fn scenario_listing_failure(rotation_context: RotationContext) {
    let _ = rotation_context;
}

#[scenario(
    path = "tests/features/rotation.feature",
    name = "A failed deletion does not stop the others"
)]
fn scenario_deletion_failure(rotation_context: RotationContext) {
    let _ = rotation_context;
}

#[scenario(
    path = "tests/features/rotation.feature",
    name = "Lingering snapshots are reported as warnings"
)]
fn scenario_lingering_snapshot(rotation_context: RotationContext) {
    let _ = rotation_context;
}

#[scenario(
    path = "tests/features/rotation.feature",
    name = "An empty fleet is not an error"
)]
fn scenario_empty_fleet(rotation_context: RotationContext) {
    let _ = rotation_context;
}

#[scenario(
    path = "tests/features/rotation.feature",
    name = "Reject a retention count of zero"
)]
fn scenario_reject_zero_retention(rotation_context: RotationContext) {
    let _ = rotation_context;
}
