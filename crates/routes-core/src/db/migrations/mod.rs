//! Schema versions of the route store.
//!
//! A store created by an older `sr` is upgraded in place when it is next
//! opened. The version lives in `PRAGMA user_version` and is mirrored in
//! `store_meta.schema_version` so it shows up in a plain `SELECT`.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Version a freshly initialized store ends up at.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL), (2, schema::MIGRATION_V2_SQL)];

/// Schema version recorded in the store file. `0` for a new file.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read or holds a negative value.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Upgrade the store to [`LATEST_SCHEMA_VERSION`] and return the version
/// it ends at.
///
/// Steps already recorded in the file are skipped. Each remaining step
/// commits together with its version bump, so two processes opening the
/// same new store cannot leave it half-migrated.
///
/// # Errors
///
/// Returns an error if any step fails; earlier steps stay applied.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(*version)],
        )?;
        tx.commit()?;
        tracing::debug!(version, "applied route store migration");
        current = *version;
    }

    Ok(current)
}
