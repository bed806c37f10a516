use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapkeep")]
#[command(about = "Snapshot a data file, rotate old copies and restore them")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backup directory
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Backup naming scheme
    #[arg(long, global = true, value_enum)]
    pub scheme: Option<SchemeArg>,

    /// Filename prefix for plain backups
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Log what is happening to stderr
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
    /// <prefix>-backup-<timestamp>.json, newest N kept
    Plain,
    /// <slot>_<description>_<timestamp>.json, fixed number of slots
    Indexed,
}

#[derive(Subcommand)]
pub enum Command {
    /// Back up a file
    Backup(BackupArgs),

    /// List available backups, newest first
    List(ListArgs),

    /// Delete all but the newest backups
    Clean(CleanArgs),

    /// Pick a backup to restore from
    Restore(RestoreArgs),
}

#[derive(Parser)]
pub struct BackupArgs {
    /// File to back up
    pub source: PathBuf,

    /// What triggered the backup (indexed scheme only)
    #[arg(long, short = 'm')]
    pub description: Option<String>,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct CleanArgs {
    /// Number of backups to keep (defaults to max_backups)
    #[arg(long, allow_negative_numbers = true)]
    pub keep: Option<i64>,

    /// Show what would be deleted without deleting
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct RestoreArgs {
    /// Restore from a specific slot instead of the most recent backup
    #[arg(long)]
    pub slot: Option<usize>,

    /// Copy the chosen backup over this file
    #[arg(long)]
    pub to: Option<PathBuf>,
}
