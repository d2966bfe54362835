//! Binary entry point for the snapwarden CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use futures::{Stream, StreamExt, stream};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use snapwarden::config::{ConfigError, RotationConfig, RotationSettings, ScalewayConfig};
use snapwarden::fleet::FleetCoordinator;
use snapwarden::logging::{self, LoggingError};
use snapwarden::provider::SnapshotProvider;
use snapwarden::report::{self, EXIT_CONFIG_ERROR, EXIT_FAILURE, ReportError};
use snapwarden::scaleway::ScalewayProvider;
use snapwarden::volume::VolumeDiscovery;

mod cli;
#[cfg(any(test, feature = "test-backdoors"))]
mod fake_fleet;
#[cfg(test)]
mod test_helpers;

use cli::Cli;

/// Exit status after a second interrupt abandons in-flight rotations.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("volume discovery failed: {0}")]
    Discovery(String),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("failed to write summary: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Logging(_) => EXIT_CONFIG_ERROR,
            Self::Provider(_) | Self::Discovery(_) | Self::Report(_) | Self::Output(_) => {
                EXIT_FAILURE
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    logging::init(cli.verbose)?;
    let settings = load_settings(&cli)?;

    #[cfg(any(test, feature = "test-backdoors"))]
    if let Some(result) = fake_fleet::run_from_env(&settings).await {
        return result;
    }

    let scaleway_config = load_scaleway_config(&cli)?;
    let run_id = Uuid::new_v4();
    let provider = ScalewayProvider::new(scaleway_config, settings.tag.clone())
        .map_err(|err| CliError::Provider(err.to_string()))?
        .with_run_id(run_id);
    execute(Arc::new(provider), &settings, run_id).await
}

fn load_settings(cli: &Cli) -> Result<RotationSettings, CliError> {
    let mut config = RotationConfig::load_without_cli_args()?;
    apply_overrides(&mut config, cli);
    Ok(config.resolve()?)
}

fn apply_overrides(config: &mut RotationConfig, cli: &Cli) {
    if let Some(count) = cli.num_backups {
        config.max_snapshots = count;
    }
    if let Some(tag) = &cli.tag {
        config.tag.clone_from(tag);
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(path) = &cli.report_file {
        config.report_file = Some(path.clone());
    }
    if cli.no_verify_deletions {
        config.skip_deletion_check = true;
    }
}

fn load_scaleway_config(cli: &Cli) -> Result<ScalewayConfig, CliError> {
    let mut config = ScalewayConfig::load_without_cli_args()?;
    if let Some(zone) = &cli.zone {
        config.default_zone.clone_from(zone);
    }
    if let Some(project_id) = &cli.project_id {
        config.default_project_id.clone_from(project_id);
    }
    config.validate()?;
    Ok(config)
}

async fn execute<P>(
    provider: Arc<P>,
    settings: &RotationSettings,
    run_id: Uuid,
) -> Result<i32, CliError>
where
    P: SnapshotProvider + VolumeDiscovery,
{
    let volumes = provider
        .discover(&settings.tag)
        .await
        .map_err(|err| CliError::Discovery(err.to_string()))?;
    if volumes.is_empty() {
        warn!(tag = %settings.tag, "no volumes found for tag, nothing to rotate");
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let token = cancel.clone();
        tokio::spawn(async move {
            let signals = stream::unfold((), |()| async {
                tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
            });
            if handle_interrupts(signals, &token).await {
                error!("second interrupt received, exiting without waiting for rotations");
                process::exit(EXIT_INTERRUPTED);
            }
        })
    };
    let fleet = FleetCoordinator::new(provider, settings.policy)
        .with_concurrency(settings.concurrency)
        .with_deletion_check(settings.verify_deletions)
        .with_run_id(run_id);
    let fleet_report = fleet.run_until_cancelled(&volumes, &cancel).await;
    interrupt.abort();

    report::write_summary(io::stdout().lock(), &fleet_report)?;
    if let Some(path) = &settings.report_file {
        report::write_json(path, &fleet_report)?;
        info!(%path, "wrote run report");
    }
    Ok(report::exit_code(&fleet_report))
}

/// Cancels `token` on the first interrupt. Resolves to `true` when a second
/// interrupt arrives and `false` when the stream ends first.
async fn handle_interrupts<S>(interrupts: S, token: &CancellationToken) -> bool
where
    S: Stream<Item = ()>,
{
    let mut pending = Box::pin(interrupts);
    if pending.next().await.is_none() {
        return false;
    }
    warn!("interrupt received, finishing in-flight rotations; interrupt again to exit");
    token.cancel();
    pending.next().await.is_some()
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
