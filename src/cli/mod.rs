//! Command-line interface definitions for the `snapwarden` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.
//! Every option is optional: when a flag is absent the value from
//! `snapwarden.toml` or the `SNAPWARDEN_*` environment applies.

use clap::Parser;

/// Top-level CLI for the `snapwarden` binary.
#[derive(Debug, Default, Parser)]
#[command(
    name = "snapwarden",
    version,
    about = "Snapshot the volumes of tagged Scaleway instances and prune old snapshots",
    long_about = "Creates a new snapshot of every volume attached to an instance \
                  carrying the selected tag, then deletes the oldest snapshots \
                  of each volume beyond the retention count. Exits 0 when every \
                  volume succeeded, 1 when any volume failed, and 2 on \
                  configuration errors."
)]
pub(crate) struct Cli {
    /// Number of snapshots to keep per volume, including the new one
    /// [default: 14].
    #[arg(
        short = 'n',
        long,
        value_name = "N",
        allow_negative_numbers = true
    )]
    pub(crate) num_backups: Option<i64>,
    /// Instance tag selecting the volumes to back up [default: Lifecycle:legacy].
    #[arg(short = 't', long, value_name = "KEY:VALUE")]
    pub(crate) tag: Option<String>,
    /// Availability zone to operate in (overrides SCW_DEFAULT_ZONE).
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Project whose instances are backed up (overrides SCW_DEFAULT_PROJECT_ID).
    #[arg(long, value_name = "PROJECT_ID")]
    pub(crate) project_id: Option<String>,
    /// Number of volumes rotated at the same time [default: 4].
    #[arg(long, value_name = "N")]
    pub(crate) concurrency: Option<usize>,
    /// Write a JSON report of the run to this path.
    #[arg(long, value_name = "PATH")]
    pub(crate) report_file: Option<String>,
    /// Skip the listing that checks deleted snapshots are gone.
    #[arg(long)]
    pub(crate) no_verify_deletions: bool,
    /// Log debug details to stderr.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}
