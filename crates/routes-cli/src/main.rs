#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use routes_core::config::resolve_config;
use routes_core::error::ErrorCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sr: smart routes connectivity",
    long_about = None
)]
struct Cli {
    /// Enable debug logging for smart routes crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Route store path, overriding `[store] path` in the project config.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a smart routes project",
        long_about = "Create .smart-routes/ with a default config and an empty route store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    sr init\n\n    # Use a store outside the project\n    sr --db /var/lib/routes.sqlite3 init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Import cities and routes from a JSON file",
        long_about = "Validate a network file against the stored network and import it in one transaction.",
        after_help = "EXAMPLES:\n    # Import a network\n    sr import --file network.json\n\nFILE FORMAT:\n    {\"cities\": [{\"id\": \"A\", \"latitude\": 48.8, \"longitude\": 2.3}],\n     \"routes\": [{\"from\": \"A\", \"to\": \"B\", \"weight\": 12.5, \"transport\": \"rail\"}]}"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Read",
        about = "Report network connectivity",
        long_about = "Report whether every city is reachable from every other city, with components and isolated cities.",
        after_help = "EXAMPLES:\n    # Human-readable report\n    sr status\n\n    # API body\n    sr status --json"
    )]
    Status,

    #[command(
        next_help_heading = "Read",
        about = "Preview the routes a guarantee would add",
        long_about = "Plan the minimum-cost synthetic routes that would connect the network, without writing them.",
        after_help = "EXAMPLES:\n    sr plan\n    sr plan --json"
    )]
    Plan,

    #[command(
        next_help_heading = "Repair",
        about = "Make the network connected",
        long_about = "Add the minimum-cost synthetic routes that connect every component. A connected network is left unchanged.",
        after_help = "EXAMPLES:\n    sr guarantee\n    sr guarantee --json"
    )]
    Guarantee,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SMART_ROUTES_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "routes=debug,info"
        } else {
            "routes=info,warn"
        })
    });

    let format = env::var("SMART_ROUTES_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = env::current_dir().context("Failed to determine current directory")?;
    let config = match resolve_config(&project_root, cli.json, cli.db.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            let mode = if cli.json {
                OutputMode::Json
            } else {
                OutputMode::Text
            };
            render_error(
                mode,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);
    debug!(store = %config.store_path.display(), output = %config.resolved_output, "config resolved");

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, &config, output, &project_root),
        Commands::Import(ref args) => cmd::import::run_import(args, &config, output),
        Commands::Status => cmd::status::run_status(&config, output),
        Commands::Plan => cmd::plan::run_plan(&config, output),
        Commands::Guarantee => cmd::guarantee::run_guarantee(&config, output),
    }
}
