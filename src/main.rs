use clap::{Parser, Subcommand};
use jiff::{Timestamp, Zoned, civil::Date};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{
    api::{ApiError, TaskNotesClient},
    config::Settings,
    quickadd::parse_create_input,
    services::{
        search::{SearchOutcome, search},
        tracking::task_overview,
    },
    storage::{StorageError, json::JsonFileStorage},
    ui::ScriptFilter,
};

mod api;
mod calendar;
mod config;
mod models;
mod quickadd;
mod services;
mod storage;
mod ui;

#[derive(Parser)]
#[command(
    name = "tasknotes-alfred",
    about = "Alfred Script Filters for TaskNotes: search, quick-add and task actions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search tasks; a query starting with ">" switches to create-only mode
    Search { query: Option<String> },

    /// Offer only the create item for the query
    Create { query: Option<String> },

    /// Show the action menu for a task path
    Actions { path: Option<String> },

    /// Print what the quick-add parser extracts from a query
    Parse {
        query: Option<String>,
        /// Reference date (YYYY-MM-DD); defaults to the local date
        #[arg(long)]
        today: Option<Date>,
        /// Print the parse result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("Cache error: {0}")]
    Storage(#[from] StorageError),
    #[error("TaskNotes client error: {0}")]
    Client(#[from] ApiError),
}

/// Tracing is opt-in via RUST_LOG and goes to stderr; stdout carries the
/// Script Filter JSON.
fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run_search(settings: &Settings, query: &str) -> Result<ScriptFilter, RunError> {
    let today = Zoned::now().date();

    if let Some(rest) = query.strip_prefix('>') {
        return Ok(ui::create_only_output(rest, today));
    }
    if settings.create_only {
        return Ok(ui::create_only_output(query, today));
    }

    let client = TaskNotesClient::from_settings(settings)?;
    let storage = JsonFileStorage::new(settings.cache_dir.clone());
    let outcome = search(&client, &storage, settings, query, Timestamp::now(), today).await?;

    Ok(match outcome {
        SearchOutcome::FilterSuggestions(filters) => {
            ScriptFilter::new(ui::filter_suggestion_items(&filters))
        }
        SearchOutcome::NotReady => ui::not_ready_output(),
        SearchOutcome::Results(results) => {
            ui::search_output(&results, &settings.subtitle_fields, today)
        }
    })
}

async fn run_actions(settings: &Settings, path: &str) -> Result<ScriptFilter, RunError> {
    if path.is_empty() {
        return Ok(ui::actions_output(None, path));
    }

    let client = TaskNotesClient::from_settings(settings)?;
    let storage = JsonFileStorage::new(settings.cache_dir.clone());
    let overview = task_overview(&client, &storage, settings, path, Timestamp::now()).await?;

    Ok(ui::actions_output(overview.as_ref(), path))
}

fn emit(result: Result<ScriptFilter, RunError>) {
    match result {
        Ok(output) => println!("{}", output.to_json()),
        Err(e) => {
            println!("{}", ui::error_output(&e.to_string()).to_json());
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    debug!(cache_dir = %settings.cache_dir.display(), api = %settings.api_base, "settings loaded");

    match cli.command {
        Commands::Search { query } => {
            let query = query.unwrap_or_default();
            emit(run_search(&settings, query.trim()).await);
        }
        Commands::Create { query } => {
            let query = query.unwrap_or_default();
            let query = query.trim();
            let query = query.strip_prefix('>').unwrap_or(query);
            emit(Ok(ui::create_only_output(query, Zoned::now().date())));
        }
        Commands::Actions { path } => {
            let path = path.unwrap_or_default();
            emit(run_actions(&settings, path.trim()).await);
        }
        Commands::Parse { query, today, json } => {
            let today = today.unwrap_or_else(|| Zoned::now().date());
            let parsed = parse_create_input(&query.unwrap_or_default(), today);

            if json {
                match serde_json::to_string_pretty(&parsed) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("Error: Failed to serialize parse result: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                ui::print_parse(&parsed);
            }
        }
    }
}
