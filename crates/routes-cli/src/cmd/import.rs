//! `sr import`: load cities and routes from a JSON network file.
//!
//! The file is validated through the graph builder, together with what is
//! already stored, before anything is written. A rejected file leaves the
//! store untouched.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use routes_core::config::EffectiveConfig;
use routes_core::error::{DataIntegrityError, ErrorCode};
use routes_core::model::{City, NetworkFile, Route};
use routes_core::repository::RouteRepository;
use routes_graph::RouteGraph;
use tracing::info;

use crate::cmd::open_repository;
use crate::output::{CliError, OutputMode, fail, render};

/// Arguments for `sr import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Network file: `{"cities": [...], "routes": [...]}`.
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: PathBuf,
}

/// Execute `sr import`.
///
/// Cities already stored take the coordinates from the file; routes are
/// appended.
pub fn run_import(
    args: &ImportArgs,
    config: &EffectiveConfig,
    output: OutputMode,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let network = match NetworkFile::from_json_str(&text) {
        Ok(network) => network,
        Err(err) => {
            return Err(fail(
                output,
                &CliError::from_code(
                    ErrorCode::InvalidNetworkFile,
                    format!("{}: {err}", args.file.display()),
                ),
            ));
        }
    };

    let repo = open_repository(config, output)?;
    let existing = repo.load_graph().context("Failed to load stored network")?;

    if let Err(err) = validate(&existing.cities, &existing.routes, &network) {
        return Err(fail(output, &CliError::from_code(err.code(), err.to_string())));
    }

    let stats = match repo.import_network(&network.cities, &network.routes) {
        Ok(stats) => stats,
        Err(err) => {
            return Err(fail(output, &CliError::from_code(err.code(), err.to_string())));
        }
    };
    info!(cities = stats.cities, routes = stats.routes, "import finished");

    render(output, &stats, |s, w| {
        writeln!(
            w,
            "Imported {} cities and {} routes from {}",
            s.cities,
            s.routes,
            args.file.display()
        )
    })
}

/// Check that the stored network plus `incoming` still forms a valid graph.
///
/// Incoming cities are checked on their own first so a duplicate inside the
/// file is reported even when it also replaces a stored city.
fn validate(
    stored_cities: &[City],
    stored_routes: &[Route],
    incoming: &NetworkFile,
) -> Result<(), DataIntegrityError> {
    RouteGraph::from_parts(incoming.cities.clone(), Vec::new())?;

    let replaced: HashSet<&str> = incoming.cities.iter().map(|c| c.id.as_str()).collect();
    let mut cities: Vec<City> = stored_cities
        .iter()
        .filter(|c| !replaced.contains(c.id.as_str()))
        .cloned()
        .collect();
    cities.extend(incoming.cities.iter().cloned());

    let mut routes = stored_routes.to_vec();
    routes.extend(incoming.routes.iter().cloned());

    RouteGraph::from_parts(cities, routes).map(|_| ())
}
