//! Host entry point for one attendance population run.
//!
//! # Responsibility
//! - Load a JSON job definition and open the SQLite attendance store.
//! - Run a single batch and print its result message.
//!
//! The caller (cron, systemd timer, job scheduler) must not start two runs
//! of the same job definition concurrently.

use attendance_core::db::open_db;
use attendance_core::{
    core_version, default_log_level, init_logging, populate_attendance, RunConfig,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "attendance_cli", about = "Populate attendance from presence events")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one population batch.
    Run {
        /// SQLite attendance store.
        #[arg(long)]
        db: PathBuf,
        /// JSON job definition with Group, Location, Schedule,
        /// InteractionChannel and DaysBack keys.
        #[arg(long)]
        job: PathBuf,
        /// Evaluate as of this RFC 3339 instant instead of the current time.
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Absolute directory for rolling log files. Logging is off without it.
        #[arg(long)]
        log_dir: Option<String>,
        #[arg(long)]
        log_level: Option<String>,
    },
    /// Print the core version.
    Version,
}

fn main() -> ExitCode {
    match Cli::parse().command {
        Command::Version => {
            println!("attendance_core version={}", core_version());
            ExitCode::SUCCESS
        }
        Command::Run {
            db,
            job,
            now,
            log_dir,
            log_level,
        } => match run(db, job, now, log_dir, log_level) {
            Ok(message) => {
                println!("{message}");
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("{message}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run(
    db: PathBuf,
    job: PathBuf,
    now: Option<DateTime<Utc>>,
    log_dir: Option<String>,
    log_level: Option<String>,
) -> Result<String, String> {
    if let Some(log_dir) = log_dir {
        let level = log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir).map_err(|err| err.to_string())?;
    }

    let job_text = std::fs::read_to_string(&job)
        .map_err(|err| format!("cannot read job definition `{}`: {err}", job.display()))?;
    let config = RunConfig::from_json_str(&job_text).map_err(|err| err.to_string())?;

    let conn = open_db(&db).map_err(|err| format!("cannot open `{}`: {err}", db.display()))?;
    let result = populate_attendance(&conn, &config, now.unwrap_or_else(Utc::now)).map_err(|err| {
        error!("event=cli_run module=cli status=error error={err}");
        err.to_string()
    })?;

    Ok(result.message)
}
