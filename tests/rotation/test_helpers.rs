//! Shared fixtures for rotation behavioural tests.

use std::process::Output;
use std::sync::LazyLock;

use escargot::CargoBuild;
use rstest::fixture;

#[derive(Clone, Debug)]
pub struct CliOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    pub fn from_process_output(output: Output) -> Self {
        let Output {
            status,
            stdout: raw_stdout,
            stderr: raw_stderr,
        } = output;
        let status_code = status.code().unwrap_or(1);
        let stdout = String::from_utf8_lossy(&raw_stdout).into_owned();
        let stderr = String::from_utf8_lossy(&raw_stderr).into_owned();
        Self {
            status_code,
            stdout,
            stderr,
        }
    }

    /// Snapshot ids the fake provider was asked to delete.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.stdout
            .lines()
            .find_map(|line| line.strip_prefix("fake-deleted="))
            .map(|ids| {
                ids.split(',')
                    .filter(|id| !id.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Summary status of one volume: `ok` or `FAILED`.
    pub fn volume_status(&self, volume_id: &str) -> Option<String> {
        let prefix = format!("{volume_id}: ");
        self.stdout.lines().find_map(|line| {
            line.strip_prefix(&prefix)
                .and_then(|rest| rest.split_whitespace().next())
                .map(str::to_owned)
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct RotationContext {
    pub scenario: String,
    pub output: Option<CliOutput>,
}

#[expect(
    clippy::expect_used,
    reason = "test setup requires panic on build failure"
)]
static SNAPWARDEN_BIN: LazyLock<escargot::CargoRun> = LazyLock::new(|| {
    CargoBuild::new()
        .bin("snapwarden")
        .features("test-backdoors")
        .run()
        .expect("failed to build snapwarden with test-backdoors feature")
});

pub fn snapwarden_cmd() -> assert_cmd::Command {
    SNAPWARDEN_BIN.command().into()
}

impl RotationContext {
    pub fn base_command(&self) -> assert_cmd::Command {
        let mut cmd = snapwarden_cmd();
        cmd.env("SNAPWARDEN_FAKE_FLEET_ENABLE", "1");
        cmd.env("SNAPWARDEN_FAKE_FLEET", &self.scenario);
        cmd.env("SNAPWARDEN_CONCURRENCY", "1");
        cmd.env_remove("SNAPWARDEN_MAX_SNAPSHOTS");
        cmd.env_remove("SNAPWARDEN_TAG");
        cmd.env_remove("SNAPWARDEN_REPORT_FILE");
        cmd.env_remove("SNAPWARDEN_LOG");
        cmd
    }

    pub fn output(&self) -> Option<&CliOutput> {
        self.output.as_ref()
    }
}

#[fixture]
pub fn rotation_context() -> RotationContext {
    RotationContext::default()
}
