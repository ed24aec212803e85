//! The route repository seam.
//!
//! The connectivity service never holds graph state between requests. It
//! reads a [`GraphSnapshot`] at the start of each request and writes back
//! through [`RouteRepository::add_routes`], which must apply a batch
//! atomically: all routes or none.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, instrument};

use crate::error::RepositoryError;
use crate::model::{City, GraphSnapshot, Revision, Route};

/// Storage for the cities and routes of a transport network.
pub trait RouteRepository: Send + Sync {
    /// Read every city and route in one consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Read`] if the store cannot be read.
    fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError>;

    /// Append `batch` in a single all-or-nothing write.
    ///
    /// When `expected` is `Some`, the write is applied only if the stored
    /// network still hashes to that revision; otherwise
    /// [`RepositoryError::Conflict`] is returned and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Write`] if the batch cannot be committed
    /// (including routes that reference unknown cities), or
    /// [`RepositoryError::Conflict`] on a revision mismatch.
    fn add_routes(&self, batch: &[Route], expected: Option<&Revision>)
    -> Result<(), RepositoryError>;
}

impl<R: RouteRepository + ?Sized> RouteRepository for &R {
    fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
        (**self).load_graph()
    }

    fn add_routes(
        &self,
        batch: &[Route],
        expected: Option<&Revision>,
    ) -> Result<(), RepositoryError> {
        (**self).add_routes(batch, expected)
    }
}

impl<R: RouteRepository + ?Sized> RouteRepository for std::sync::Arc<R> {
    fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
        (**self).load_graph()
    }

    fn add_routes(
        &self,
        batch: &[Route],
        expected: Option<&Revision>,
    ) -> Result<(), RepositoryError> {
        (**self).add_routes(batch, expected)
    }
}

// ---------------------------------------------------------------------------
// InMemoryRouteRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    cities: Vec<City>,
    routes: Vec<Route>,
}

/// A [`RouteRepository`] held entirely in process memory.
///
/// Writes can be made to fail on demand to exercise the all-or-nothing
/// path of callers.
#[derive(Debug, Default)]
pub struct InMemoryRouteRepository {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl InMemoryRouteRepository {
    #[must_use]
    pub fn new(cities: Vec<City>, routes: Vec<Route>) -> Self {
        Self {
            state: Mutex::new(MemoryState { cities, routes }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent [`RouteRepository::add_routes`] fail (or stop failing).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of routes currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Read`] if the state lock is poisoned.
    pub fn route_count(&self) -> Result<usize, RepositoryError> {
        let state = self
            .state
            .lock()
            .map_err(|_| RepositoryError::read("lock in-memory network", "lock poisoned"))?;
        Ok(state.routes.len())
    }
}

impl RouteRepository for InMemoryRouteRepository {
    #[instrument(skip(self))]
    fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
        let state = self
            .state
            .lock()
            .map_err(|_| RepositoryError::read("lock in-memory network", "lock poisoned"))?;
        Ok(GraphSnapshot::new(state.cities.clone(), state.routes.clone()))
    }

    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    fn add_routes(
        &self,
        batch: &[Route],
        expected: Option<&Revision>,
    ) -> Result<(), RepositoryError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RepositoryError::write("lock in-memory network", "lock poisoned"))?;

        if let Some(expected) = expected {
            let actual = Revision::of(&state.cities, &state.routes);
            if actual != *expected {
                return Err(RepositoryError::Conflict {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::write(
                "append route batch",
                "write failure injected",
            ));
        }

        let known: HashSet<&str> = state.cities.iter().map(|c| c.id.as_str()).collect();
        if let Some(route) = batch
            .iter()
            .find(|r| !known.contains(r.from.as_str()) || !known.contains(r.to.as_str()))
        {
            return Err(RepositoryError::write(
                "append route batch",
                format!("route {} -> {} references an unknown city", route.from, route.to),
            ));
        }

        state.routes.extend_from_slice(batch);
        debug!(total_routes = state.routes.len(), "route batch appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InMemoryRouteRepository {
        InMemoryRouteRepository::new(
            vec![City::new("A"), City::new("B"), City::new("C")],
            vec![Route::new("A", "B", 1.0, "rail")],
        )
    }

    #[test]
    fn load_returns_stamped_snapshot() {
        let repo = sample();
        let snapshot = repo.load_graph().expect("load");
        assert_eq!(snapshot.cities.len(), 3);
        assert_eq!(snapshot.routes.len(), 1);
        assert_eq!(
            snapshot.revision,
            Revision::of(&snapshot.cities, &snapshot.routes)
        );
    }

    #[test]
    fn unconditional_append_changes_revision() {
        let repo = sample();
        let before = repo.load_graph().expect("load").revision;
        repo.add_routes(&[Route::new("B", "C", 2.0, "bus")], None)
            .expect("append");
        let after = repo.load_graph().expect("load");
        assert_eq!(after.routes.len(), 2);
        assert_ne!(before, after.revision);
    }

    #[test]
    fn stale_revision_is_rejected_without_writing() {
        let repo = sample();
        let stale = repo.load_graph().expect("load").revision;
        repo.add_routes(&[Route::new("B", "C", 2.0, "bus")], None)
            .expect("append");

        let err = repo
            .add_routes(&[Route::new("A", "C", 2.0, "bus")], Some(&stale))
            .expect_err("stale revision must conflict");
        assert!(err.is_conflict());
        assert_eq!(repo.route_count().expect("count"), 2);
    }

    #[test]
    fn batch_with_unknown_city_is_rejected_whole() {
        let repo = sample();
        let batch = [
            Route::new("B", "C", 2.0, "bus"),
            Route::new("C", "Z", 2.0, "bus"),
        ];
        let err = repo.add_routes(&batch, None).expect_err("unknown city");
        assert!(matches!(err, RepositoryError::Write { .. }));
        assert_eq!(repo.route_count().expect("count"), 1);
    }

    #[test]
    fn injected_failure_leaves_state_untouched() {
        let repo = sample();
        repo.set_fail_writes(true);
        let err = repo
            .add_routes(&[Route::new("B", "C", 2.0, "bus")], None)
            .expect_err("injected failure");
        assert!(matches!(err, RepositoryError::Write { .. }));
        assert_eq!(repo.route_count().expect("count"), 1);

        repo.set_fail_writes(false);
        repo.add_routes(&[Route::new("B", "C", 2.0, "bus")], None)
            .expect("append after recovery");
        assert_eq!(repo.route_count().expect("count"), 2);
    }
}
