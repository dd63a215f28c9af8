//! Command-line entry point.
//!
//! # Responsibility
//! - Parse arguments and open the requested collection.
//! - Run one maintenance operation and print its report.
//!
//! # Invariants
//! - An invalid group table aborts before the collection is opened.
//! - Exit code is non-zero whenever the operation fails.

use clap::{Parser, Subcommand};
use flagpurple_core::{
    default_group_specs, default_log_level, init_logging, load_group_specs, open_db,
    CollectionService, DedupReport, GroupSpec, SqliteCollectionRepository, TagFixReport,
};
use log::error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "flagpurple", version, about = "Share audio between duplicate example sentences")]
struct Cli {
    /// TOML group table replacing the built-in groups.
    #[arg(long, global = true, value_name = "FILE")]
    groups: Option<PathBuf>,

    /// Directory for rolling log files; logging is off when omitted.
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// trace, debug, info, warn or error.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tag duplicates, share their audio and suspend their listening cards.
    ProcessDuplicates {
        /// Path to the collection file.
        collection: PathBuf,
    },
    /// Repair legacy duplicate tags.
    FixTags {
        /// Path to the collection file.
        collection: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    if let Some((level, dir)) = logging_target(&cli)? {
        init_logging(level, &dir.to_string_lossy())?;
    }

    let groups = match &cli.groups {
        Some(path) => load_group_specs(path).map_err(|err| err.to_string())?,
        None => default_group_specs(),
    };

    match &cli.command {
        Command::ProcessDuplicates { collection } => {
            let report = with_service(collection, groups, |service| {
                service.process_duplicates().map_err(|err| err.to_string())
            })?;
            print!("{}", render_dedup_report(&report));
        }
        Command::FixTags { collection } => {
            let report = with_service(collection, groups, |service| {
                service.fix_tags().map_err(|err| err.to_string())
            })?;
            print!("{}", render_tag_report(&report));
        }
    }
    Ok(())
}

fn with_service<T>(
    collection: &Path,
    groups: Vec<GroupSpec>,
    f: impl FnOnce(&mut CollectionService<SqliteCollectionRepository<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let mut conn = open_db(collection)
        .map_err(|err| format!("cannot open `{}`: {err}", collection.display()))?;
    let repo = SqliteCollectionRepository::try_new(&mut conn).map_err(|err| err.to_string())?;
    let mut service = CollectionService::with_groups(repo, groups).map_err(|err| err.to_string())?;
    f(&mut service)
}

/// Level and absolute directory for file logging, when `--log-dir` is set.
fn logging_target(cli: &Cli) -> Result<Option<(&str, PathBuf)>, String> {
    match (&cli.log_dir, cli.log_level.as_deref()) {
        (Some(dir), level) => Ok(Some((level.unwrap_or(default_log_level()), absolute(dir)?))),
        (None, Some(_)) => Err("--log-level requires --log-dir".to_string()),
        (None, None) => Ok(None),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| format!("cannot resolve `{}`: {err}", path.display()))
}

fn render_dedup_report(report: &DedupReport) -> String {
    format!(
        "groups scanned:        {}\n\
         notes scanned:         {}\n\
         keys scanned:          {}\n\
         keys without audio:    {}\n\
         keys with conflicts:   {}\n\
         audio unified:         {}\n\
         duplicate tags added:  {}\n\
         audio copied:          {}\n\
         cards flagged:         {}\n",
        report.groups_scanned,
        report.notes_scanned,
        report.keys_scanned,
        report.keys_without_audio,
        report.keys_with_conflicting_audio,
        report.audio_unified,
        report.tags_added,
        report.audio_copied,
        report.cards_flagged,
    )
}

fn render_tag_report(report: &TagFixReport) -> String {
    format!(
        "tags removed: {}\ntags renamed: {}\n",
        report.removed, report.renamed
    )
}
