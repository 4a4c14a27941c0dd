//! findixi-nearby: drive the nearby surface from the terminal.
//!
//! `replay` feeds a recorded drive through a full session and prints every
//! camera move and committed result set; `query` runs one radius query
//! around a fixed point; `favorite` toggles a device-local favorite.

use clap::{Parser, Subcommand, ValueEnum};
use findixi_core::config::Config;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod output;
mod wiring;

/// Nearby discovery CLI for Findixi
#[derive(Parser)]
#[command(name = "findixi-nearby")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to findixi.toml in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Print collected metrics as JSON on stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Colored text
    Text,
    /// JSON on stdout
    Json,
}

/// Query filters shared by `replay` and `query`
#[derive(Debug, Clone, clap::Args)]
pub struct FilterArgs {
    /// Search radius in miles (clamped to the configured bounds)
    #[arg(short, long)]
    pub radius: Option<f64>,

    /// Category id
    #[arg(long)]
    pub category: Option<i64>,

    /// Only records open right now
    #[arg(long)]
    pub open_now: bool,

    /// Record store fixture (JSON array); uses the hosted backend when omitted
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Skip routing lookups and use the analytic estimate only
    #[arg(long)]
    pub offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded drive through a nearby session
    Replay {
        /// Recorded drive (JSON array of track points)
        #[arg(short, long)]
        track: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Run a single query around a point
    Query {
        /// Latitude of the center
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude of the center
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[command(flatten)]
        filters: FilterArgs,

        /// Narrow the list by name, description or municipality
        #[arg(short, long)]
        search: Option<String>,

        /// Only favorites
        #[arg(long)]
        favorites_only: bool,
    },

    /// Toggle a device-local favorite
    Favorite {
        /// Record id
        id: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut telemetry = findixi_telemetry::TelemetryConfig::default().with_level(&config.schema.telemetry.log_level);
    telemetry.json = config.schema.telemetry.json;
    if cli.verbose {
        telemetry = telemetry.with_level("debug");
    }
    if let Err(e) = findixi_telemetry::init_with_config(telemetry) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    // The session keeps its rounds as local futures, so everything runs on
    // one thread.
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let Cli { command, format, metrics, .. } = cli;
    let schema = &config.schema;
    let result = runtime.block_on(async move {
        match command {
            Commands::Replay { track, filters } => commands::replay::run(schema, &track, &filters, format).await,
            Commands::Query {
                lat,
                lon,
                filters,
                search,
                favorites_only,
            } => {
                let display = commands::query::Display {
                    search,
                    favorites_only,
                };
                commands::query::run(schema, (lat, lon), &filters, &display, format).await
            }
            Commands::Favorite { id } => commands::favorite::run(schema, id, format),
        }
    });

    if metrics {
        match serde_json::to_string_pretty(&findixi_telemetry::metrics().export_json()) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => eprintln!("{} {}", "Warning:".yellow().bold(), e),
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
