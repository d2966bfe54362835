//! In-memory fleet used by behavioural tests of the binary.
//!
//! Enabled by `SNAPWARDEN_FAKE_FLEET_ENABLE=1`; `SNAPWARDEN_FAKE_FLEET` picks
//! a scenario. The run goes through the same discovery, rotation, and report
//! path as a real one, only against [`ScriptedProvider`].

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use uuid::Uuid;

use snapwarden::config::RotationSettings;
use snapwarden::test_support::{ScriptedProvider, completed_snapshot};
use snapwarden::volume::Volume;

use super::{CliError, execute};

pub(crate) const ENABLE_ENV: &str = "SNAPWARDEN_FAKE_FLEET_ENABLE";
pub(crate) const SCENARIO_ENV: &str = "SNAPWARDEN_FAKE_FLEET";

const SEEDED_SNAPSHOTS: i64 = 3;

/// Runs the scripted fleet when enabled, otherwise returns `None`.
pub(crate) async fn run_from_env(settings: &RotationSettings) -> Option<Result<i32, CliError>> {
    if env::var(ENABLE_ENV).ok().as_deref() != Some("1") {
        return None;
    }
    let scenario = env::var(SCENARIO_ENV).unwrap_or_else(|_| String::from("healthy"));
    let provider = match seeded_provider(&scenario) {
        Ok(provider) => provider,
        Err(err) => return Some(Err(err)),
    };

    let outcome = execute(Arc::new(provider.clone()), settings, Uuid::nil()).await;
    writeln!(
        io::stdout(),
        "fake-deleted={}",
        provider.deletions().join(",")
    )
    .ok();
    Some(outcome)
}

/// Builds the scripted fleet for `scenario`.
///
/// Two instances carry `Lifecycle=legacy` (one with two volumes) and one
/// carries `Lifecycle=current`. Every volume starts with three snapshots.
pub(crate) fn seeded_provider(scenario: &str) -> Result<ScriptedProvider, CliError> {
    let provider = ScriptedProvider::new();
    if scenario != "empty" {
        seed_fleet(&provider);
    }
    match scenario {
        "healthy" | "empty" => {}
        "creation-failure" => provider.fail_creation("vol-web-1"),
        "listing-failure" => provider.fail_listing("vol-db-0"),
        "deletion-failure" => provider.fail_deletion("vol-web-0-old-1"),
        "lingering" => provider.linger_after_deletion("vol-web-0-old-1"),
        other => {
            return Err(CliError::Provider(format!(
                "unknown fake fleet scenario {other:?}"
            )));
        }
    }
    Ok(provider)
}

fn seed_fleet(provider: &ScriptedProvider) {
    let fleet = [
        ("srv-web", "web-01", "Lifecycle=legacy", "vol-web-0", "0"),
        ("srv-web", "web-01", "Lifecycle=legacy", "vol-web-1", "1"),
        ("srv-db", "db-01", "Lifecycle=legacy", "vol-db-0", "0"),
        ("srv-dev", "dev-01", "Lifecycle=current", "vol-dev-0", "0"),
    ];
    for (instance_id, name, tag, volume_id, slot) in fleet {
        provider.add_volume(
            Volume::new(volume_id, instance_id, slot)
                .instance_name(Some(name.to_owned()))
                .tags(vec![tag.to_owned()]),
        );
        for offset in 1..=SEEDED_SNAPSHOTS {
            provider.add_snapshot(completed_snapshot(
                &format!("{volume_id}-old-{offset}"),
                volume_id,
                offset,
            ));
        }
    }
}
