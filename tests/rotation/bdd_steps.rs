//! BDD step definitions for fleet rotation runs.

use std::fmt;

use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{CliOutput, RotationContext};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error("failed to execute snapwarden command: {0}")]
    Execution(String),
}

/// Quoted step argument.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Quoted(String);

impl AsRef<str> for Quoted {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for Quoted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl std::str::FromStr for Quoted {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(value.to_owned()))
    }
}

fn output_of(context: &RotationContext) -> Result<&CliOutput, StepError> {
    context
        .output()
        .ok_or_else(|| StepError::Assertion(String::from("missing command output")))
}

#[given("a fake fleet in the \"{scenario}\" scenario")]
fn fake_fleet(mut rotation_context: RotationContext, scenario: Quoted) -> RotationContext {
    rotation_context.scenario = scenario.to_string();
    rotation_context
}

#[when("I run snapwarden keeping {count} snapshots")]
fn run_rotation(
    mut rotation_context: RotationContext,
    count: i64,
) -> Result<RotationContext, StepError> {
    let mut cmd = rotation_context.base_command();
    cmd.args(["--num-backups", &count.to_string()]);
    let output = cmd
        .output()
        .map_err(|err| StepError::Execution(err.to_string()))?;

    rotation_context.output = Some(CliOutput::from_process_output(output));
    Ok(rotation_context)
}

#[then("the run exits with status {status}")]
fn assert_status(rotation_context: &RotationContext, status: i32) -> Result<(), StepError> {
    let output = output_of(rotation_context)?;
    if output.status_code != status {
        return Err(StepError::Assertion(format!(
            "expected exit status {status}, got {}; stdout: {}; stderr: {}",
            output.status_code, output.stdout, output.stderr
        )));
    }
    Ok(())
}

#[then("snapshot \"{snapshot_id}\" was deleted")]
fn assert_deleted(rotation_context: &RotationContext, snapshot_id: Quoted) -> Result<(), StepError> {
    let deleted = output_of(rotation_context)?.deleted_ids();
    if !deleted.iter().any(|id| id == snapshot_id.as_ref()) {
        return Err(StepError::Assertion(format!(
            "expected {snapshot_id} to be deleted, deleted: {deleted:?}"
        )));
    }
    Ok(())
}

#[then("snapshot \"{snapshot_id}\" was not deleted")]
fn assert_not_deleted(
    rotation_context: &RotationContext,
    snapshot_id: Quoted,
) -> Result<(), StepError> {
    let deleted = output_of(rotation_context)?.deleted_ids();
    if deleted.iter().any(|id| id == snapshot_id.as_ref()) {
        return Err(StepError::Assertion(format!(
            "expected {snapshot_id} to survive, deleted: {deleted:?}"
        )));
    }
    Ok(())
}

#[then("no snapshot of volume \"{volume_id}\" was deleted")]
fn assert_volume_untouched(
    rotation_context: &RotationContext,
    volume_id: Quoted,
) -> Result<(), StepError> {
    let deleted = output_of(rotation_context)?.deleted_ids();
    let prefix = format!("{volume_id}-");
    if deleted.iter().any(|id| id.starts_with(&prefix)) {
        return Err(StepError::Assertion(format!(
            "expected no deletions for {volume_id}, deleted: {deleted:?}"
        )));
    }
    Ok(())
}

#[then("the summary reports volume \"{volume_id}\" as \"{status}\"")]
fn assert_volume_status(
    rotation_context: &RotationContext,
    volume_id: Quoted,
    status: Quoted,
) -> Result<(), StepError> {
    let output = output_of(rotation_context)?;
    let actual = output.volume_status(volume_id.as_ref()).ok_or_else(|| {
        StepError::Assertion(format!(
            "summary has no line for {volume_id}: {}",
            output.stdout
        ))
    })?;
    if actual != status.as_ref() {
        return Err(StepError::Assertion(format!(
            "expected {volume_id} to be {status}, got {actual}"
        )));
    }
    Ok(())
}

#[then("the output mentions \"{snippet}\"")]
fn assert_stdout_mentions(
    rotation_context: &RotationContext,
    snippet: Quoted,
) -> Result<(), StepError> {
    let output = output_of(rotation_context)?;
    if !output.stdout.contains(snippet.as_ref()) {
        return Err(StepError::Assertion(format!(
            "expected stdout to contain '{snippet}', got: {}",
            output.stdout
        )));
    }
    Ok(())
}

#[then("stderr mentions \"{snippet}\"")]
fn assert_stderr_mentions(
    rotation_context: &RotationContext,
    snippet: Quoted,
) -> Result<(), StepError> {
    let output = output_of(rotation_context)?;
    if !output.stderr.contains(snippet.as_ref()) {
        return Err(StepError::Assertion(format!(
            "expected stderr to contain '{snippet}', got: {}",
            output.stderr
        )));
    }
    Ok(())
}
