use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use clap::Args;
use routes_core::config::{EffectiveConfig, PROJECT_DIR};
use routes_core::db::SqliteRouteRepository;
use serde::Serialize;
use tracing::info;

use crate::output::{CliError, OutputMode, fail, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the default config even if `.smart-routes/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[store]\n\
    path = \".smart-routes/routes.sqlite3\"\n\
    \n\
    [connectivity]\n\
    fallback_cost = 1.0\n\
    synthetic_transport = \"synthetic\"\n\
    max_conflict_retries = 3\n";

const GITIGNORE: &str = "*.sqlite3\n*.sqlite3-wal\n*.sqlite3-shm\n";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitOutput {
    config_path: String,
    store_path: String,
}

/// Execute `sr init`. Creates the project skeleton:
///
/// ```text
/// .smart-routes/
///   config.toml         (default project config)
///   .gitignore          (store files)
///   routes.sqlite3      (empty, migrated route store)
/// ```
///
/// An existing store is opened and migrated, never truncated.
///
/// # Errors
///
/// Returns an error if `.smart-routes/` already exists and `--force` is not
/// set, or if any filesystem or store operation fails.
pub fn run_init(
    args: &InitArgs,
    config: &EffectiveConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let project_dir = project_root.join(PROJECT_DIR);

    if project_dir.exists() && !args.force {
        return Err(fail(
            output,
            &CliError::with_details(
                format!("{PROJECT_DIR}/ already exists"),
                "use `sr init --force` to rewrite the default config",
                "already_initialized",
            ),
        ));
    }

    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let config_path = project_dir.join("config.toml");
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = project_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    SqliteRouteRepository::open(&config.store_path)
        .with_context(|| format!("Failed to create store: {}", config.store_path.display()))?;
    info!(store = %config.store_path.display(), "project initialized");

    let payload = InitOutput {
        config_path: config_path.display().to_string(),
        store_path: config.store_path.display().to_string(),
    };
    render(output, &payload, |p, w| {
        writeln!(w, "Initialized {PROJECT_DIR}/")?;
        writeln!(w)?;
        writeln!(w, "  Config: {}", p.config_path)?;
        writeln!(w, "  Store:  {}", p.store_path)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  sr import --file network.json")?;
        writeln!(w, "  sr status")
    })
}
