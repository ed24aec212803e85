//! [`RouteRepository`] backed by the SQLite route store.
//!
//! ## Atomic batches
//!
//! [`SqliteRouteRepository::add_routes`] opens a `BEGIN IMMEDIATE`
//! transaction, so the revision check and the inserts happen under the
//! store's write lock. Either every route of the batch is committed or the
//! transaction is rolled back on drop and nothing is.
//!
//! ## Connections
//!
//! Each repository owns one connection behind a mutex. Separate processes
//! (or separate repositories on the same file) coordinate through SQLite's
//! own locking and the busy timeout configured in [`super::open_store`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior, params};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::RepositoryError;
use crate::model::{City, GraphSnapshot, Revision, Route};
use crate::repository::RouteRepository;

/// Rows written by [`SqliteRouteRepository::import_network`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub cities: usize,
    pub routes: usize,
}

/// SQLite implementation of [`RouteRepository`].
#[derive(Debug)]
pub struct SqliteRouteRepository {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteRouteRepository {
    /// Open (creating if needed) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = super::open_store(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open the store at `path` only if it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be opened or migrated.
    pub fn try_open(path: &Path) -> Result<Option<Self>> {
        Ok(super::try_open_store(path)?.map(|conn| Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        }))
    }

    /// A private, migrated in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory route store")?;
        super::configure_connection(&conn).context("configure sqlite pragmas")?;
        super::migrations::migrate(&mut conn).context("apply route store migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// File backing this store, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Upsert `cities` and append `routes` in one transaction.
    ///
    /// Cities already present keep their row and take the new coordinates.
    /// Callers are expected to have validated the set (see the graph
    /// builder); the schema constraints reject anything that slips through
    /// and the whole import is rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Write`] if any row is rejected.
    #[instrument(skip(self, cities, routes), fields(city_count = cities.len(), route_count = routes.len()))]
    pub fn import_network(
        &self,
        cities: &[City],
        routes: &[Route],
    ) -> Result<ImportStats, RepositoryError> {
        let mut conn = self.lock_for_write()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::write("begin import", e))?;
        let now = Utc::now().timestamp_micros();

        {
            let mut upsert = tx
                .prepare_cached(
                    "INSERT INTO cities (city_id, latitude, longitude, created_at_us)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(city_id) DO UPDATE SET
                        latitude = excluded.latitude,
                        longitude = excluded.longitude",
                )
                .map_err(|e| RepositoryError::write("prepare city upsert", e))?;
            for city in cities {
                upsert
                    .execute(params![city.id, city.latitude, city.longitude, now])
                    .map_err(|e| RepositoryError::write(format!("upsert city {}", city.id), e))?;
            }
        }

        insert_routes(&tx, routes, now)?;
        touch_meta(&tx, now)?;
        tx.commit()
            .map_err(|e| RepositoryError::write("commit import", e))?;

        info!(cities = cities.len(), routes = routes.len(), "network imported");
        Ok(ImportStats {
            cities: cities.len(),
            routes: routes.len(),
        })
    }

    fn lock_for_read(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::read("lock route store connection", "lock poisoned"))
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::write("lock route store connection", "lock poisoned"))
    }
}

impl RouteRepository for SqliteRouteRepository {
    #[instrument(skip(self))]
    fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
        let mut conn = self.lock_for_read()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::read("begin snapshot read", e))?;
        let snapshot =
            read_snapshot(&tx).map_err(|e| RepositoryError::read("read network snapshot", e))?;
        tx.commit()
            .map_err(|e| RepositoryError::read("finish snapshot read", e))?;

        debug!(
            cities = snapshot.cities.len(),
            routes = snapshot.routes.len(),
            revision = %snapshot.revision,
            "network snapshot loaded"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    fn add_routes(
        &self,
        batch: &[Route],
        expected: Option<&Revision>,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.lock_for_write()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::write("begin route batch", e))?;

        if let Some(expected) = expected {
            let actual = read_snapshot(&tx)
                .map_err(|e| RepositoryError::write("re-read network for revision check", e))?
                .revision;
            if actual != *expected {
                debug!(%expected, %actual, "route batch rejected: revision moved");
                return Err(RepositoryError::Conflict {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let now = Utc::now().timestamp_micros();
        insert_routes(&tx, batch, now)?;
        touch_meta(&tx, now)?;
        tx.commit()
            .map_err(|e| RepositoryError::write("commit route batch", e))?;

        debug!("route batch committed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn read_snapshot(conn: &Connection) -> rusqlite::Result<GraphSnapshot> {
    let mut stmt =
        conn.prepare_cached("SELECT city_id, latitude, longitude FROM cities ORDER BY city_id")?;
    let cities = stmt
        .query_map([], |row| {
            Ok(City {
                id: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT from_city_id, to_city_id, weight, transport FROM routes ORDER BY route_id",
    )?;
    let routes = stmt
        .query_map([], |row| {
            Ok(Route {
                from: row.get(0)?,
                to: row.get(1)?,
                weight: row.get(2)?,
                transport: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(GraphSnapshot::new(cities, routes))
}

fn insert_routes(conn: &Connection, routes: &[Route], now: i64) -> Result<(), RepositoryError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO routes (from_city_id, to_city_id, weight, transport, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(|e| RepositoryError::write("prepare route insert", e))?;
    for route in routes {
        stmt.execute(params![route.from, route.to, route.weight, route.transport, now])
            .map_err(|e| {
                RepositoryError::write(format!("insert route {} -> {}", route.from, route.to), e)
            })?;
    }
    Ok(())
}

fn touch_meta(conn: &Connection, now: i64) -> Result<(), RepositoryError> {
    conn.execute(
        "UPDATE store_meta SET last_write_at_us = ?1 WHERE id = 1",
        [now],
    )
    .map_err(|e| RepositoryError::write("update store_meta", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteRouteRepository {
        let repo = SqliteRouteRepository::open_in_memory().expect("open store");
        repo.import_network(
            &[
                City::located("A", 52.52, 13.405),
                City::new("B"),
                City::new("C"),
            ],
            &[Route::new("A", "B", 2.5, "rail")],
        )
        .expect("import");
        repo
    }

    #[test]
    fn empty_store_loads_empty_snapshot() {
        let repo = SqliteRouteRepository::open_in_memory().expect("open store");
        let snapshot = repo.load_graph().expect("load");
        assert!(snapshot.cities.is_empty());
        assert!(snapshot.routes.is_empty());
        assert_eq!(snapshot.revision, Revision::of(&[], &[]));
    }

    #[test]
    fn import_round_trips_cities_and_routes() {
        let repo = seeded();
        let snapshot = repo.load_graph().expect("load");
        assert_eq!(
            snapshot.cities,
            vec![
                City::located("A", 52.52, 13.405),
                City::new("B"),
                City::new("C"),
            ]
        );
        assert_eq!(snapshot.routes, vec![Route::new("A", "B", 2.5, "rail")]);
    }

    #[test]
    fn reimport_updates_coordinates_without_dropping_routes() {
        let repo = seeded();
        repo.import_network(&[City::located("B", 1.0, 2.0)], &[])
            .expect("re-import");
        let snapshot = repo.load_graph().expect("load");
        assert_eq!(snapshot.cities[1], City::located("B", 1.0, 2.0));
        assert_eq!(snapshot.routes.len(), 1, "upsert must not cascade-delete routes");
    }

    #[test]
    fn revision_matches_in_memory_computation() {
        let repo = seeded();
        let snapshot = repo.load_graph().expect("load");
        assert_eq!(
            snapshot.revision,
            Revision::of(&snapshot.cities, &snapshot.routes)
        );
    }

    #[test]
    fn conditional_append_commits_on_matching_revision() {
        let repo = seeded();
        let revision = repo.load_graph().expect("load").revision;
        repo.add_routes(&[Route::new("B", "C", 1.0, "synthetic")], Some(&revision))
            .expect("append");
        assert_eq!(repo.load_graph().expect("load").routes.len(), 2);
    }

    #[test]
    fn conditional_append_rejects_stale_revision() {
        let repo = seeded();
        let stale = repo.load_graph().expect("load").revision;
        repo.add_routes(&[Route::new("B", "C", 1.0, "bus")], None)
            .expect("append");

        let err = repo
            .add_routes(&[Route::new("A", "C", 1.0, "synthetic")], Some(&stale))
            .expect_err("stale revision");
        assert!(err.is_conflict());
        assert_eq!(repo.load_graph().expect("load").routes.len(), 2);
    }

    #[test]
    fn failing_route_rolls_back_whole_batch() {
        let repo = seeded();
        let batch = [
            Route::new("B", "C", 1.0, "synthetic"),
            Route::new("C", "NOWHERE", 1.0, "synthetic"),
        ];
        let err = repo.add_routes(&batch, None).expect_err("unknown city");
        assert!(matches!(err, RepositoryError::Write { .. }));
        assert_eq!(
            repo.load_graph().expect("load").routes.len(),
            1,
            "first route of a failed batch must not persist"
        );
    }

    #[test]
    fn file_store_is_shared_between_repositories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("routes.sqlite3");
        let writer = SqliteRouteRepository::open(&path).expect("open writer");
        let reader = SqliteRouteRepository::open(&path).expect("open reader");

        writer
            .import_network(&[City::new("A"), City::new("B")], &[])
            .expect("import");
        writer
            .add_routes(&[Route::new("A", "B", 1.0, "bus")], None)
            .expect("append");

        let snapshot = reader.load_graph().expect("load");
        assert_eq!(snapshot.routes.len(), 1);
        assert_eq!(reader.path(), Some(path.as_path()));
    }

    #[test]
    fn try_open_does_not_create_missing_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("missing/routes.sqlite3");
        assert!(SqliteRouteRepository::try_open(&path).expect("probe").is_none());
        assert!(!path.exists());

        SqliteRouteRepository::open(&path).expect("create");
        assert!(SqliteRouteRepository::try_open(&path).expect("reopen").is_some());
    }
}
