pub mod guarantee;
pub mod import;
pub mod init;
pub mod plan;
pub mod status;

use routes_core::config::EffectiveConfig;
use routes_core::db::SqliteRouteRepository;
use routes_core::error::ErrorCode;
use routes_graph::ConnectivityService;

use crate::output::{CliError, OutputMode, fail};

/// Open the configured store, failing with `E1001` if `sr init` has not run.
pub fn open_repository(
    config: &EffectiveConfig,
    output: OutputMode,
) -> anyhow::Result<SqliteRouteRepository> {
    match SqliteRouteRepository::try_open(&config.store_path)? {
        Some(repo) => Ok(repo),
        None => Err(fail(
            output,
            &CliError::from_code(
                ErrorCode::NotInitialized,
                format!("route store not found at {}", config.store_path.display()),
            ),
        )),
    }
}

/// Connectivity service over the configured store.
pub fn open_service(
    config: &EffectiveConfig,
    output: OutputMode,
) -> anyhow::Result<ConnectivityService<SqliteRouteRepository>> {
    let repo = open_repository(config, output)?;
    Ok(ConnectivityService::new(
        repo,
        config.project.connectivity.clone(),
    ))
}
