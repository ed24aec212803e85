//! Connectivity service.
//!
//! Every call is an independent computation over a snapshot loaded at the
//! start of the call; the service holds no mutable state between calls. The
//! repository is the only shared resource.
//!
//! # Guarantee loop
//!
//! ```text
//! load ─▶ connected? ──yes──▶ return (accumulated additions)
//!            │ no
//!            ▼
//!       plan ─▶ verify in memory ─▶ add_routes(plan, loaded revision)
//!                                      │ ok            │ conflict
//!                                      ▼               ▼
//!                                 reload, re-check   reload, retry
//! ```
//!
//! After a successful write the reload is expected to be connected. If it
//! is not and its revision is exactly the one the write should have
//! produced, the planner is wrong and the call fails with
//! [`ConnectivityError::InvariantViolation`]. If the revision moved, another
//! writer got in between and the loop runs again. Conflicts and moved
//! revisions share one retry budget, `max_conflict_retries`.
//!
//! A write failure before anything was committed leaves the store untouched
//! and is reported as [`ConnectivityError::RepositoryWrite`]. Once a batch
//! has been committed, a later failure is reported as
//! [`ConnectivityError::PartialAugmentation`], which carries the routes that
//! stayed stored.

use routes_core::config::ConnectivityConfig;
use routes_core::error::{DataIntegrityError, ErrorCode, RepositoryError};
use routes_core::model::{GraphSnapshot, Revision, Route};
use routes_core::repository::RouteRepository;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::graph::{AugmentationPlan, ConnectivityReport, Partition, RouteGraph, plan_augmentation};

/// Failures of a connectivity operation.
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    /// The stored network is not a valid graph. Never retried.
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    /// The network could not be loaded.
    #[error("could not load the route network")]
    RepositoryRead(#[source] RepositoryError),

    /// The synthetic routes could not be committed. Nothing from this call
    /// was stored.
    #[error("could not persist synthetic routes")]
    RepositoryWrite(#[source] RepositoryError),

    /// A write failed after earlier batches of the same call were committed.
    /// `added` is stored; the network may still be disconnected.
    #[error("stopped after storing {} synthetic routes", .added.len())]
    PartialAugmentation {
        added: Vec<AddedConnection>,
        #[source]
        source: RepositoryError,
    },

    /// The network is still disconnected after a plan that should have
    /// connected it.
    #[error("network still has {component_count} components after augmentation (revision {revision})")]
    InvariantViolation {
        component_count: usize,
        revision: Revision,
    },
}

impl ConnectivityError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DataIntegrity(err) => err.code(),
            Self::RepositoryRead(err) | Self::RepositoryWrite(err) => err.code(),
            Self::PartialAugmentation { .. } => ErrorCode::PartialAugmentation,
            Self::InvariantViolation { .. } => ErrorCode::ConnectivityInvariantViolated,
        }
    }
}

/// One synthetic route as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedConnection {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

impl From<&Route> for AddedConnection {
    fn from(route: &Route) -> Self {
        Self {
            from: route.from.clone(),
            to: route.to.clone(),
            weight: route.weight,
        }
    }
}

/// Result of [`ConnectivityService::guarantee_connectivity`].
///
/// Serializes to `{"isConnected": true, "addedConnections": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuaranteeOutcome {
    pub is_connected: bool,
    pub added_connections: Vec<AddedConnection>,
    /// Component count of the first snapshot this call loaded.
    #[serde(skip)]
    pub components_before: usize,
    /// Revision of the final, connected snapshot.
    #[serde(skip)]
    pub revision: Revision,
}

/// Dry run of a guarantee: what would be written, and against which state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AugmentationPreview {
    pub report: ConnectivityReport,
    pub plan: AugmentationPlan,
    pub revision: Revision,
}

/// Connectivity queries and repair over a [`RouteRepository`].
#[derive(Debug)]
pub struct ConnectivityService<R> {
    repository: R,
    config: ConnectivityConfig,
}

impl<R: RouteRepository> ConnectivityService<R> {
    pub const fn new(repository: R, config: ConnectivityConfig) -> Self {
        Self { repository, config }
    }

    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    #[must_use]
    pub const fn config(&self) -> &ConnectivityConfig {
        &self.config
    }

    /// Report on the current network. Read-only.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectivityError::RepositoryRead`] if the network cannot be
    /// loaded, or [`ConnectivityError::DataIntegrity`] if it is invalid.
    #[instrument(skip(self))]
    pub fn get_connectivity_status(&self) -> Result<ConnectivityReport, ConnectivityError> {
        let (snapshot, graph) = self.load()?;
        let partition = Partition::find(&graph);
        let report = ConnectivityReport::new(&partition, graph.city_count());
        info!(
            revision = %snapshot.revision,
            component_count = report.component_count,
            is_connected = report.is_connected,
            "connectivity status"
        );
        Ok(report)
    }

    /// Plan the synthetic routes a guarantee would add, without writing.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_connectivity_status`].
    #[instrument(skip(self))]
    pub fn preview_augmentation(&self) -> Result<AugmentationPreview, ConnectivityError> {
        let (snapshot, graph) = self.load()?;
        let partition = Partition::find(&graph);
        let report = ConnectivityReport::new(&partition, graph.city_count());
        let plan = plan_augmentation(&graph, &partition, &self.config);
        debug!(
            revision = %snapshot.revision,
            component_count = report.component_count,
            planned = plan.len(),
            "augmentation preview"
        );
        Ok(AugmentationPreview {
            report,
            plan,
            revision: snapshot.revision,
        })
    }

    /// Make the stored network connected with the fewest, cheapest synthetic
    /// routes, and report what was added.
    ///
    /// Idempotent: on a connected network nothing is written and
    /// `added_connections` is empty.
    ///
    /// # Errors
    ///
    /// - [`ConnectivityError::RepositoryRead`] if a load fails.
    /// - [`ConnectivityError::DataIntegrity`] if the stored network is invalid.
    /// - [`ConnectivityError::RepositoryWrite`] if the batch cannot be
    ///   committed, including when concurrent writers exhaust the retry
    ///   budget. Nothing from this call is stored.
    /// - [`ConnectivityError::PartialAugmentation`] for the same failures
    ///   after an earlier batch of this call was committed. The error lists
    ///   the stored routes.
    /// - [`ConnectivityError::InvariantViolation`] if the network is still
    ///   disconnected after a plan was applied.
    #[instrument(skip(self), fields(max_retries = self.config.max_conflict_retries))]
    pub fn guarantee_connectivity(&self) -> Result<GuaranteeOutcome, ConnectivityError> {
        let mut added: Vec<AddedConnection> = Vec::new();
        let mut components_before: Option<usize> = None;
        let mut committed: Option<Revision> = None;
        let mut retries: u32 = 0;

        loop {
            let (snapshot, graph) = self.load()?;
            let partition = Partition::find(&graph);
            let before = *components_before.get_or_insert(partition.component_count());

            if partition.is_connected() {
                info!(
                    revision = %snapshot.revision,
                    component_count = before,
                    added = added.len(),
                    "network connected"
                );
                return Ok(GuaranteeOutcome {
                    is_connected: true,
                    added_connections: added,
                    components_before: before,
                    revision: snapshot.revision,
                });
            }

            if let Some(expected) = committed.take() {
                if expected == snapshot.revision {
                    error!(
                        revision = %snapshot.revision,
                        component_count = partition.component_count(),
                        "network disconnected after committed augmentation"
                    );
                    return Err(ConnectivityError::InvariantViolation {
                        component_count: partition.component_count(),
                        revision: snapshot.revision,
                    });
                }
                retries += 1;
                warn!(
                    expected = %expected,
                    actual = %snapshot.revision,
                    retries,
                    "network changed after commit; augmenting again"
                );
                if retries > self.config.max_conflict_retries {
                    return Err(write_failure(
                        added,
                        RepositoryError::Conflict {
                            expected,
                            actual: snapshot.revision,
                        },
                    ));
                }
            }

            let plan = plan_augmentation(&graph, &partition, &self.config);
            let batch = plan.routes();
            let expected_after = verify_plan(&graph, &batch)?;

            match self.repository.add_routes(&batch, Some(&snapshot.revision)) {
                Ok(()) => {
                    info!(
                        revision = %snapshot.revision,
                        component_count = partition.component_count(),
                        added = batch.len(),
                        "synthetic routes committed"
                    );
                    added.extend(batch.iter().map(AddedConnection::from));
                    committed = Some(expected_after);
                }
                Err(err) if err.is_conflict() => {
                    retries += 1;
                    warn!(error = %err, retries, "write conflict; reloading");
                    if retries > self.config.max_conflict_retries {
                        return Err(write_failure(added, err));
                    }
                }
                Err(err) => {
                    error!(error = %err, stored = added.len(), "synthetic route batch rejected");
                    return Err(write_failure(added, err));
                }
            }
        }
    }

    fn load(&self) -> Result<(GraphSnapshot, RouteGraph), ConnectivityError> {
        let snapshot = self
            .repository
            .load_graph()
            .map_err(ConnectivityError::RepositoryRead)?;
        let graph = RouteGraph::from_snapshot(&snapshot)?;
        Ok((snapshot, graph))
    }
}

/// Classify a failed write by whether this call already stored routes.
fn write_failure(added: Vec<AddedConnection>, source: RepositoryError) -> ConnectivityError {
    if added.is_empty() {
        ConnectivityError::RepositoryWrite(source)
    } else {
        ConnectivityError::PartialAugmentation { added, source }
    }
}

/// Check that `batch` connects `graph` and return the revision the store
/// should have once it is committed.
fn verify_plan(graph: &RouteGraph, batch: &[Route]) -> Result<Revision, ConnectivityError> {
    let augmented = graph.with_routes(batch)?;
    let partition = Partition::find(&augmented);
    if !partition.is_connected() {
        let revision = augmented.content_hash();
        error!(
            component_count = partition.component_count(),
            revision = %revision,
            "planned augmentation does not connect the network"
        );
        return Err(ConnectivityError::InvariantViolation {
            component_count: partition.component_count(),
            revision,
        });
    }
    Ok(augmented.content_hash())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use routes_core::model::City;
    use routes_core::repository::InMemoryRouteRepository;

    fn repo(ids: &[&str], edges: &[(&str, &str)]) -> InMemoryRouteRepository {
        InMemoryRouteRepository::new(
            ids.iter().map(|id| City::new(*id)).collect(),
            edges
                .iter()
                .map(|(a, b)| Route::new(*a, *b, 1.0, "rail"))
                .collect(),
        )
    }

    fn service<R: RouteRepository>(repository: R) -> ConnectivityService<R> {
        ConnectivityService::new(repository, ConnectivityConfig::default())
    }

    fn pairs(outcome: &GuaranteeOutcome) -> Vec<(&str, &str)> {
        outcome
            .added_connections
            .iter()
            .map(|c| (c.from.as_str(), c.to.as_str()))
            .collect()
    }

    #[test]
    fn status_is_read_only() {
        let svc = service(repo(&["A", "B", "C"], &[("A", "B")]));
        let before = svc.repository().load_graph().expect("load").revision;
        let report = svc.get_connectivity_status().expect("status");
        assert_eq!(report.component_count, 2);
        assert_eq!(svc.repository().load_graph().expect("load").revision, before);
    }

    #[test]
    fn guarantee_connects_and_lists_additions() {
        let svc = service(repo(&["A", "B", "C", "D"], &[("A", "B")]));
        let outcome = svc.guarantee_connectivity().expect("guarantee");
        assert!(outcome.is_connected);
        assert_eq!(outcome.components_before, 3);
        assert_eq!(pairs(&outcome), vec![("A", "C"), ("A", "D")]);

        let report = svc.get_connectivity_status().expect("status");
        assert!(report.is_connected);
        assert_eq!(report.component_count, 1);
        assert_eq!(svc.repository().route_count().expect("count"), 3);
    }

    #[test]
    fn guarantee_on_connected_network_writes_nothing() {
        let svc = service(repo(&["A", "B"], &[("A", "B")]));
        let before = svc.repository().load_graph().expect("load").revision;
        let outcome = svc.guarantee_connectivity().expect("guarantee");
        assert!(outcome.is_connected);
        assert!(outcome.added_connections.is_empty());
        assert_eq!(outcome.revision, before);
    }

    #[test]
    fn guarantee_serializes_camel_case() {
        let svc = service(repo(&["A", "B"], &[]));
        let outcome = svc.guarantee_connectivity().expect("guarantee");
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["isConnected"], true);
        assert_eq!(json["addedConnections"][0]["from"], "A");
        assert_eq!(json["addedConnections"][0]["to"], "B");
        assert_eq!(json["addedConnections"][0]["weight"], 1.0);
        assert!(json.get("componentsBefore").is_none());
    }

    #[test]
    fn preview_does_not_write() {
        let svc = service(repo(&["A", "B", "C"], &[]));
        let preview = svc.preview_augmentation().expect("preview");
        assert_eq!(preview.plan.len(), 2);
        assert_eq!(preview.report.component_count, 3);
        assert_eq!(
            svc.repository().load_graph().expect("load").revision,
            preview.revision
        );
    }

    #[test]
    fn failed_write_leaves_network_unchanged() {
        let inner = repo(&["A", "B", "C"], &[]);
        inner.set_fail_writes(true);
        let svc = service(inner);
        let before = svc.repository().load_graph().expect("load").revision;

        let err = svc.guarantee_connectivity().expect_err("write must fail");
        assert!(matches!(err, ConnectivityError::RepositoryWrite(_)));
        assert_eq!(err.code(), ErrorCode::StoreWriteFailed);
        assert_eq!(svc.repository().load_graph().expect("load").revision, before);
        assert_eq!(svc.repository().route_count().expect("count"), 0);
    }

    #[test]
    fn invalid_network_is_a_data_integrity_error() {
        let svc = service(InMemoryRouteRepository::new(
            vec![City::new("A"), City::new("A")],
            vec![],
        ));
        let err = svc.get_connectivity_status().expect_err("duplicate city");
        assert!(matches!(err, ConnectivityError::DataIntegrity(_)));
        assert_eq!(err.code(), ErrorCode::DuplicateCity);
    }

    /// Lets another writer connect the network right before the first write.
    struct RacingRepository {
        inner: InMemoryRouteRepository,
        raced: AtomicUsize,
    }

    impl RouteRepository for RacingRepository {
        fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
            self.inner.load_graph()
        }

        fn add_routes(
            &self,
            batch: &[Route],
            expected: Option<&Revision>,
        ) -> Result<(), RepositoryError> {
            if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner.add_routes(
                    &[
                        Route::new("A", "B", 1.0, "synthetic"),
                        Route::new("A", "C", 1.0, "synthetic"),
                    ],
                    None,
                )?;
            }
            self.inner.add_routes(batch, expected)
        }
    }

    #[test]
    fn losing_a_race_degrades_to_no_op() {
        let svc = service(RacingRepository {
            inner: repo(&["A", "B", "C"], &[]),
            raced: AtomicUsize::new(0),
        });
        let outcome = svc.guarantee_connectivity().expect("guarantee");
        assert!(outcome.is_connected);
        assert!(outcome.added_connections.is_empty());
        assert_eq!(svc.repository().inner.route_count().expect("count"), 2);
    }

    /// Every conditional write is rejected as stale.
    struct AlwaysConflicting {
        inner: InMemoryRouteRepository,
        attempts: AtomicUsize,
    }

    impl RouteRepository for AlwaysConflicting {
        fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
            self.inner.load_graph()
        }

        fn add_routes(
            &self,
            _batch: &[Route],
            expected: Option<&Revision>,
        ) -> Result<(), RepositoryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let actual = self.inner.load_graph()?.revision;
            Err(RepositoryError::Conflict {
                expected: expected.cloned().unwrap_or_else(|| actual.clone()),
                actual,
            })
        }
    }

    #[test]
    fn exhausted_retries_surface_as_write_conflict() {
        let svc = ConnectivityService::new(
            AlwaysConflicting {
                inner: repo(&["A", "B"], &[]),
                attempts: AtomicUsize::new(0),
            },
            ConnectivityConfig {
                max_conflict_retries: 2,
                ..ConnectivityConfig::default()
            },
        );
        let err = svc.guarantee_connectivity().expect_err("must give up");
        assert_eq!(err.code(), ErrorCode::WriteConflict);
        assert_eq!(svc.repository().attempts.load(Ordering::SeqCst), 3);
    }

    /// Commits the first write. After that every load shows one more
    /// isolated city, and every write fails.
    struct GrowingRepository {
        inner: InMemoryRouteRepository,
        arrivals: AtomicUsize,
        committed: AtomicUsize,
        conflict_later: bool,
    }

    impl GrowingRepository {
        fn new(conflict_later: bool) -> Self {
            Self {
                inner: repo(&["A", "B", "C"], &[]),
                arrivals: AtomicUsize::new(0),
                committed: AtomicUsize::new(0),
                conflict_later,
            }
        }
    }

    impl RouteRepository for GrowingRepository {
        fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
            let snapshot = self.inner.load_graph()?;
            if self.committed.load(Ordering::SeqCst) == 0 {
                return Ok(snapshot);
            }
            let arrived = self.arrivals.fetch_add(1, Ordering::SeqCst) + 1;
            let mut cities = snapshot.cities;
            cities.extend((0..arrived).map(|i| City::new(format!("Z{i}"))));
            Ok(GraphSnapshot::new(cities, snapshot.routes))
        }

        fn add_routes(
            &self,
            batch: &[Route],
            expected: Option<&Revision>,
        ) -> Result<(), RepositoryError> {
            if self.committed.fetch_add(1, Ordering::SeqCst) == 0 {
                return self.inner.add_routes(batch, expected);
            }
            let actual = self.load_graph()?.revision;
            if self.conflict_later {
                Err(RepositoryError::Conflict {
                    expected: expected.cloned().unwrap_or_else(|| actual.clone()),
                    actual,
                })
            } else {
                Err(RepositoryError::write("append route batch", "disk full"))
            }
        }
    }

    #[test]
    fn failure_after_commit_reports_stored_routes() {
        let svc = service(GrowingRepository::new(false));
        let err = svc.guarantee_connectivity().expect_err("second write fails");

        let ConnectivityError::PartialAugmentation { ref added, ref source } = err else {
            panic!("expected a partial augmentation, got {err:?}");
        };
        let stored: Vec<(&str, &str)> =
            added.iter().map(|c| (c.from.as_str(), c.to.as_str())).collect();
        assert_eq!(stored, vec![("A", "B"), ("A", "C")]);
        assert_eq!(source.code(), ErrorCode::StoreWriteFailed);
        assert_eq!(err.code(), ErrorCode::PartialAugmentation);
        assert_eq!(svc.repository().inner.route_count().expect("count"), 2);
    }

    #[test]
    fn retries_exhausted_after_commit_report_stored_routes() {
        let svc = ConnectivityService::new(
            GrowingRepository::new(true),
            ConnectivityConfig {
                max_conflict_retries: 2,
                ..ConnectivityConfig::default()
            },
        );
        let err = svc.guarantee_connectivity().expect_err("must give up");
        assert_eq!(err.code(), ErrorCode::PartialAugmentation);
        assert!(matches!(
            err,
            ConnectivityError::PartialAugmentation {
                source: RepositoryError::Conflict { .. },
                ..
            }
        ));
        assert_eq!(svc.repository().inner.route_count().expect("count"), 2);
    }

    /// Acknowledges writes, drops them, and reports the revision the write
    /// would have produced.
    struct DroppingRepository {
        inner: InMemoryRouteRepository,
        claimed: Mutex<Option<Revision>>,
    }

    impl RouteRepository for DroppingRepository {
        fn load_graph(&self) -> Result<GraphSnapshot, RepositoryError> {
            let mut snapshot = self.inner.load_graph()?;
            if let Some(revision) = self.claimed.lock().expect("lock").clone() {
                snapshot.revision = revision;
            }
            Ok(snapshot)
        }

        fn add_routes(
            &self,
            batch: &[Route],
            _expected: Option<&Revision>,
        ) -> Result<(), RepositoryError> {
            let snapshot = self.inner.load_graph()?;
            let mut routes = snapshot.routes;
            routes.extend_from_slice(batch);
            *self.claimed.lock().expect("lock") = Some(Revision::of(&snapshot.cities, &routes));
            Ok(())
        }
    }

    #[test]
    fn disconnected_after_commit_is_an_invariant_violation() {
        let svc = service(DroppingRepository {
            inner: repo(&["A", "B"], &[]),
            claimed: Mutex::new(None),
        });
        let err = svc.guarantee_connectivity().expect_err("must detect");
        assert!(matches!(
            err,
            ConnectivityError::InvariantViolation {
                component_count: 2,
                ..
            }
        ));
        assert_eq!(err.code(), ErrorCode::ConnectivityInvariantViolated);
    }
}
