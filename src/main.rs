//! things2reclaim CLI - Keep Things, Reclaim and Toggl in sync.

use chrono::Utc;
use clap::Parser;
use std::process;
use things2reclaim::cli::{Cli, Commands, ConfigCommands};
use things2reclaim::commands::{self, CommandResult, SyncOptions};
use things2reclaim::config::{ConfigOverrides, OutputFormat, Settings, resolve_settings};
use things2reclaim::prompt::TerminalPrompter;
use things2reclaim::providers::{ReclaimClient, ThingsDatabase, TogglClient};
use things2reclaim::reconcile::TrackingWindow;
use things2reclaim::storage::{SettingsFiles, UploadLedger};
use tracing_subscriber::EnvFilter;

/// Env var holding a tracing filter directive, e.g. `things2reclaim=debug`.
const LOG_ENV: &str = "T2R_LOG";

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut json = cli.json;
    let result = SettingsFiles::from_env().and_then(|files| {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref db) = cli.db {
            overrides = overrides.with_database_path(db);
        }
        if cli.json {
            overrides = overrides.with_output_format(OutputFormat::Json);
        }
        let settings = resolve_settings(&files, &overrides)?;
        json = settings.output_format.value == OutputFormat::Json;
        run_command(cli.command, &files, &settings, json)
    });

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            if json {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(1);
        }
    }
}

/// Log to stderr; `-v` raises the default level to info, `-vv` to debug.
fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "things2reclaim=warn",
        1 => "things2reclaim=info",
        _ => "things2reclaim=debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn things(settings: &Settings) -> Result<ThingsDatabase, things2reclaim::Error> {
    ThingsDatabase::open(&settings.things_database_path()?, settings.things_auth_token())
}

fn reclaim(settings: &Settings) -> Result<ReclaimClient, things2reclaim::Error> {
    Ok(ReclaimClient::new(
        &settings.reclaim_url.value,
        settings.require_reclaim_token()?,
    ))
}

fn toggl(settings: &Settings) -> Result<TogglClient, things2reclaim::Error> {
    TogglClient::connect(&settings.toggl_url.value, settings.require_toggl_token()?)
}

fn ledger(settings: &Settings) -> Result<UploadLedger, things2reclaim::Error> {
    UploadLedger::open(&settings.database_path.value)
}

/// Run one command and print its result.
///
/// Returns `Ok(false)` when the command produced output but still failed.
fn run_command(
    command: Commands,
    files: &SettingsFiles,
    settings: &Settings,
    json: bool,
) -> Result<bool, things2reclaim::Error> {
    let area = settings.area.value.as_str();
    let sync_options = |dry_run| SyncOptions::new(dry_run, settings.completion_delay());

    match command {
        Commands::Init => {
            let result = commands::init(&reclaim(settings)?, &ledger(settings)?)?;
            Ok(output(&result, json))
        }
        Commands::Upload { dry_run } => {
            let result = commands::upload(
                &things(settings)?,
                &mut reclaim(settings)?,
                &ledger(settings)?,
                area,
                dry_run,
            )?;
            Ok(output(&result, json))
        }
        Commands::List { subject } => {
            let result = commands::list(&reclaim(settings)?, subject.as_deref(), Utc::now())?;
            Ok(output(&result, json))
        }
        Commands::Start { name, tags } => {
            let result = commands::start(
                &mut reclaim(settings)?,
                &mut toggl(settings)?,
                &name.join(" "),
                &tags,
                &mut TerminalPrompter::stdio(),
            )?;
            Ok(output(&result, json))
        }
        Commands::Stop => {
            let result = commands::stop(
                &mut reclaim(settings)?,
                &mut toggl(settings)?,
                &mut TerminalPrompter::stdio(),
            )?;
            Ok(output(&result, json))
        }
        Commands::Stats => {
            let result = commands::stats(&things(settings)?, &reclaim(settings)?, area, Utc::now())?;
            Ok(output(&result, json))
        }
        Commands::Time { subject } => {
            let result = commands::time(&reclaim(settings)?, subject.as_deref(), Utc::now())?;
            Ok(output(&result, json))
        }
        Commands::Remove { name } => {
            let result = commands::remove(
                &mut things(settings)?,
                &mut reclaim(settings)?,
                &ledger(settings)?,
                &name.join(" "),
                &mut TerminalPrompter::stdio(),
            )?;
            Ok(output(&result, json))
        }
        Commands::Finished { dry_run } => {
            let result = commands::finished(
                &mut things(settings)?,
                &reclaim(settings)?,
                &ledger(settings)?,
                sync_options(dry_run),
            )?;
            Ok(output(&result, json))
        }
        Commands::RemoveDeleted { dry_run } => {
            let result = commands::remove_deleted(
                &things(settings)?,
                &mut reclaim(settings)?,
                &ledger(settings)?,
                dry_run,
            )?;
            Ok(output(&result, json))
        }
        Commands::Tracking {
            since_days,
            dry_run,
        } => {
            let window =
                TrackingWindow::ending_today(since_days.unwrap_or(settings.tracking_days.value))?;
            let result =
                commands::tracking(&mut reclaim(settings)?, &toggl(settings)?, window, dry_run)?;
            Ok(output(&result, json))
        }
        Commands::Current => {
            let result = commands::current(&toggl(settings)?, Utc::now())?;
            Ok(output(&result, json))
        }
        Commands::Sync { dry_run } => {
            let result = commands::sync(
                &mut things(settings)?,
                &mut reclaim(settings)?,
                &ledger(settings)?,
                area,
                sync_options(dry_run),
            )?;
            Ok(output(&result, json))
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init => {
                let result = commands::config_init(files)?;
                Ok(output(&result, json))
            }
            ConfigCommands::Show => Ok(output(&commands::config_show(settings), json)),
        },
    }
}

/// Print a result; returns false when the command should exit non-zero.
fn output<T: CommandResult>(result: &T, json: bool) -> bool {
    if json {
        println!("{}", result.to_json());
    } else {
        println!("{}", result.to_human());
    }
    !result.is_failure()
}
