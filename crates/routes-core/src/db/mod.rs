//! The SQLite file behind `SqliteRouteRepository`.
//!
//! One store file is shared by every `sr` process pointed at the same
//! project. Status reads and guarantee writes can overlap, so each
//! connection is opened in WAL mode with a 5 s busy timeout, and a
//! guarantee that loses the write lock waits rather than failing. Foreign
//! keys are enforced so a synthetic route cannot point at a city another
//! writer never committed.

pub mod migrations;
pub mod schema;
pub mod store;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

pub use store::{ImportStats, SqliteRouteRepository};

/// How long a writer waits for a competing guarantee or import to commit.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the route store at `path`, creating the file and its directory on
/// first use (`sr init`), and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be opened, configured, or migrated.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create route store directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("open route store {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply route store migrations")?;

    Ok(conn)
}

/// Open the route store only if `sr init` already created it.
///
/// Read commands use this so a missing store is reported as E1001 rather
/// than answered from a freshly created, empty network.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or migrated.
pub fn try_open_store(path: &Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }
    open_store(path).map(Some)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
