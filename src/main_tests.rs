//! Unit tests for the `snapwarden` CLI binary implementation.

use super::*;
use crate::fake_fleet::{ENABLE_ENV, SCENARIO_ENV, seeded_provider};
use crate::test_helpers::EnvGuard;
use rstest::rstest;
use snapwarden::config::DEFAULT_TAG;
use snapwarden::policy::RetentionPolicy;
use snapwarden::tag::TagFilter;
use std::num::NonZeroUsize;

fn base_config() -> RotationConfig {
    RotationConfig {
        max_snapshots: 14,
        tag: DEFAULT_TAG.to_owned(),
        concurrency: 4,
        skip_deletion_check: false,
        report_file: None,
    }
}

fn settings(max_snapshots: u32) -> RotationSettings {
    RotationSettings {
        policy: RetentionPolicy::new(max_snapshots).expect("valid policy"),
        tag: "Lifecycle:legacy".parse::<TagFilter>().expect("valid tag"),
        concurrency: NonZeroUsize::MIN,
        verify_deletions: true,
        report_file: None,
    }
}

#[test]
fn overrides_replace_loaded_values() {
    let mut config = base_config();
    let cli = Cli {
        num_backups: Some(3),
        tag: Some(String::from("Backup:nightly")),
        concurrency: Some(8),
        report_file: Some(String::from("out/report.json")),
        no_verify_deletions: true,
        ..Cli::default()
    };

    apply_overrides(&mut config, &cli);

    assert_eq!(config.max_snapshots, 3);
    assert_eq!(config.tag, "Backup:nightly");
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.report_file.as_deref(), Some("out/report.json"));
    assert!(config.skip_deletion_check);
}

#[test]
fn absent_flags_keep_loaded_values() {
    let mut config = base_config();

    apply_overrides(&mut config, &Cli::default());

    assert_eq!(config, base_config());
}

#[rstest]
#[case::negative_count(-1)]
#[case::zero_count(0)]
fn invalid_count_override_fails_resolution(#[case] count: i64) {
    let mut config = base_config();
    let cli = Cli {
        num_backups: Some(count),
        ..Cli::default()
    };
    apply_overrides(&mut config, &cli);

    let err = CliError::from(config.resolve().expect_err("count should be rejected"));

    assert_eq!(err.exit_code(), EXIT_CONFIG_ERROR);
    assert!(err.to_string().contains("--num-backups"), "error: {err}");
}

#[rstest]
#[case::provider(CliError::Provider(String::from("boom")), EXIT_FAILURE)]
#[case::discovery(CliError::Discovery(String::from("boom")), EXIT_FAILURE)]
#[case::config(CliError::Config(ConfigError::InvalidConcurrency), EXIT_CONFIG_ERROR)]
#[case::output(CliError::Output(io::Error::other("closed")), EXIT_FAILURE)]
fn errors_map_to_exit_codes(#[case] err: CliError, #[case] expected: i32) {
    assert_eq!(err.exit_code(), expected);
}

#[test]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    let err = CliError::Discovery(String::from("instance listing returned 503"));
    write_error(&mut buf, &err);
    let rendered = String::from_utf8(buf).expect("utf8");
    assert_eq!(
        rendered,
        "volume discovery failed: instance listing returned 503\n"
    );
}

#[test]
fn unknown_fake_scenario_is_a_provider_error() {
    let err = seeded_provider("flaky").expect_err("unknown scenario");
    assert!(
        matches!(err, CliError::Provider(ref message) if message.contains("flaky")),
        "unexpected error: {err}"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn healthy_fleet_rotates_tagged_volumes_only() {
    let provider = seeded_provider("healthy").expect("seeded fleet");

    let code = execute(Arc::new(provider.clone()), &settings(2), Uuid::nil())
        .await
        .expect("run completes");

    assert_eq!(code, report::EXIT_SUCCESS);
    assert_eq!(provider.snapshots("vol-web-0").len(), 2);
    assert_eq!(provider.snapshots("vol-db-0").len(), 2);
    assert_eq!(provider.snapshots("vol-dev-0").len(), 3);
    assert!(
        !provider
            .deletions()
            .iter()
            .any(|id| id.starts_with("vol-dev-0")),
        "untagged volume was pruned"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn creation_failure_still_trims_excess_and_fails_run() {
    let provider = seeded_provider("creation-failure").expect("seeded fleet");

    let code = execute(Arc::new(provider.clone()), &settings(2), Uuid::nil())
        .await
        .expect("run completes");

    assert_eq!(code, EXIT_FAILURE);
    let kept: Vec<String> = provider
        .snapshots("vol-web-1")
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(kept, ["vol-web-1-old-2", "vol-web-1-old-3"]);
    assert!(
        provider
            .deletions()
            .iter()
            .any(|id| id == "vol-web-1-old-1")
    );
    assert_eq!(provider.snapshots("vol-web-0").len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn lingering_deletion_is_reported_without_failing_run() {
    let provider = seeded_provider("lingering").expect("seeded fleet");

    let code = execute(Arc::new(provider.clone()), &settings(2), Uuid::nil())
        .await
        .expect("run completes");

    assert_eq!(code, report::EXIT_SUCCESS);
    assert!(
        provider
            .deletions()
            .iter()
            .any(|id| id == "vol-web-0-old-1")
    );
}

#[tokio::test(flavor = "current_thread")]
async fn empty_fleet_succeeds_without_changes() {
    let provider = seeded_provider("empty").expect("empty fleet");

    let code = execute(Arc::new(provider.clone()), &settings(2), Uuid::nil())
        .await
        .expect("run completes");

    assert_eq!(code, report::EXIT_SUCCESS);
    assert!(provider.deletions().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn fake_fleet_is_inert_without_enable_flag() {
    let _guard = EnvGuard::set_var(SCENARIO_ENV, "healthy").await;

    assert!(fake_fleet::run_from_env(&settings(2)).await.is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn fake_fleet_reports_listing_failure() {
    let _guard = EnvGuard::set_vars(&[(ENABLE_ENV, "1"), (SCENARIO_ENV, "listing-failure")]).await;

    let outcome = fake_fleet::run_from_env(&settings(2))
        .await
        .expect("fake fleet enabled");

    assert!(matches!(outcome, Ok(code) if code == EXIT_FAILURE));
}

#[tokio::test(flavor = "current_thread")]
async fn first_interrupt_cancels_and_second_requests_exit() {
    let token = CancellationToken::new();

    let exit = handle_interrupts(stream::iter([(), ()]), &token).await;

    assert!(token.is_cancelled());
    assert!(exit);
}

#[tokio::test(flavor = "current_thread")]
async fn single_interrupt_only_cancels() {
    let token = CancellationToken::new();

    let exit = handle_interrupts(stream::iter([()]), &token).await;

    assert!(token.is_cancelled());
    assert!(!exit);
}

#[tokio::test(flavor = "current_thread")]
async fn no_interrupt_leaves_run_alone() {
    let token = CancellationToken::new();

    let exit = handle_interrupts(stream::empty(), &token).await;

    assert!(!token.is_cancelled());
    assert!(!exit);
}
