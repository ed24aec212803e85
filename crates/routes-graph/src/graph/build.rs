//! Graph construction from a repository snapshot.
//!
//! # Overview
//!
//! [`RouteGraph`] is the validated, immutable in-memory form of the
//! network: a petgraph undirected graph whose nodes are city ids and whose
//! edges are routes.
//!
//! ## Validation
//!
//! Construction rejects, before any analysis runs:
//!
//! - empty city ids and duplicate city ids
//! - coordinates that are half-present, non-finite, or out of range
//! - routes whose endpoint is not a declared city
//! - routes from a city to itself
//! - negative or non-finite route weights
//! - routes with a blank transport tag
//!
//! ## Edge Direction
//!
//! Routes keep their stored `from`/`to` order on the edge weight, but the
//! graph is undirected: a scheduled one-way link still makes both cities
//! reachable from each other for connectivity purposes.
//!
//! ## Node Order
//!
//! Cities are inserted sorted by id, so `NodeIndex(i)` is the `i`-th city in
//! lexical order. The partition and planner rely on this.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use routes_core::error::DataIntegrityError;
use routes_core::model::{City, Coordinates, GraphSnapshot, Revision, Route};
use tracing::instrument;

// ---------------------------------------------------------------------------
// RouteGraph
// ---------------------------------------------------------------------------

/// Edge payload: the route's stored attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEdge {
    pub from: String,
    pub to: String,
    pub weight: f64,
    pub transport: String,
}

/// A validated, undirected transport network.
///
/// There are no mutation methods. Adding routes produces a new value via
/// [`RouteGraph::with_routes`].
#[derive(Debug, Clone)]
pub struct RouteGraph {
    graph: UnGraph<String, RouteEdge>,
    node_map: HashMap<String, NodeIndex>,
    coordinates: Vec<Option<Coordinates>>,
    cities: Vec<City>,
    routes: Vec<Route>,
}

impl RouteGraph {
    /// Build a [`RouteGraph`] from a repository snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`DataIntegrityError`] if the snapshot is not a valid graph.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Result<Self, DataIntegrityError> {
        Self::from_parts(snapshot.cities.clone(), snapshot.routes.clone())
    }

    /// Build a [`RouteGraph`] from owned city and route lists.
    ///
    /// Input order does not matter.
    ///
    /// # Errors
    ///
    /// Returns a [`DataIntegrityError`] describing the first problem found.
    /// Cities are checked before routes.
    #[instrument(skip_all, fields(cities = cities.len(), routes = routes.len()))]
    pub fn from_parts(
        mut cities: Vec<City>,
        routes: Vec<Route>,
    ) -> Result<Self, DataIntegrityError> {
        for city in &cities {
            validate_city(city)?;
        }

        cities.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = cities.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(DataIntegrityError::DuplicateCity {
                city_id: pair[0].id.clone(),
            });
        }

        let mut graph = UnGraph::<String, RouteEdge>::with_capacity(cities.len(), routes.len());
        let mut node_map: HashMap<String, NodeIndex> = HashMap::with_capacity(cities.len());
        let mut coordinates = Vec::with_capacity(cities.len());

        for city in &cities {
            let idx = graph.add_node(city.id.clone());
            node_map.insert(city.id.clone(), idx);
            coordinates.push(city.coordinates());
        }

        for route in &routes {
            if route.from == route.to {
                return Err(DataIntegrityError::SelfLoop {
                    city_id: route.from.clone(),
                });
            }
            let from = lookup_endpoint(&node_map, route, &route.from)?;
            let to = lookup_endpoint(&node_map, route, &route.to)?;
            if !route.weight.is_finite() || route.weight < 0.0 {
                return Err(DataIntegrityError::InvalidWeight {
                    from: route.from.clone(),
                    to: route.to.clone(),
                    weight: route.weight,
                });
            }
            if route.transport.trim().is_empty() {
                return Err(DataIntegrityError::EmptyTransport {
                    from: route.from.clone(),
                    to: route.to.clone(),
                });
            }
            graph.add_edge(
                from,
                to,
                RouteEdge {
                    from: route.from.clone(),
                    to: route.to.clone(),
                    weight: route.weight,
                    transport: route.transport.clone(),
                },
            );
        }

        Ok(Self {
            graph,
            node_map,
            coordinates,
            cities,
            routes,
        })
    }

    /// Return a new graph with `extra` routes added to this one.
    ///
    /// # Errors
    ///
    /// Returns a [`DataIntegrityError`] if any extra route is invalid.
    pub fn with_routes(&self, extra: &[Route]) -> Result<Self, DataIntegrityError> {
        let mut routes = Vec::with_capacity(self.routes.len() + extra.len());
        routes.extend_from_slice(&self.routes);
        routes.extend_from_slice(extra);
        Self::from_parts(self.cities.clone(), routes)
    }

    /// Return the number of cities (nodes).
    #[must_use]
    pub fn city_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of routes (edges), parallel routes included.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Cities directly linked to `city_id`, sorted and deduplicated.
    ///
    /// Returns `None` for an unknown city.
    #[must_use]
    pub fn neighbors(&self, city_id: &str) -> Option<Vec<&str>> {
        let idx = *self.node_map.get(city_id)?;
        let mut out: Vec<&str> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        Some(out)
    }

    /// City ids in lexical (node index) order.
    pub fn city_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.cities.iter().map(|c| c.id.as_str())
    }

    /// Cities sorted by id.
    #[must_use]
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// Routes in the order they were supplied.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Look up the `NodeIndex` for a city id.
    #[must_use]
    pub fn node_index(&self, city_id: &str) -> Option<NodeIndex> {
        self.node_map.get(city_id).copied()
    }

    /// Return the city id label for a node.
    #[must_use]
    pub fn city_id(&self, idx: NodeIndex) -> Option<&str> {
        self.graph.node_weight(idx).map(String::as_str)
    }

    /// Coordinates of `city_id`, if the city is known and located.
    #[must_use]
    pub fn coordinates(&self, city_id: &str) -> Option<Coordinates> {
        self.node_map
            .get(city_id)
            .and_then(|idx| self.coordinates_at(idx.index()))
    }

    /// The underlying petgraph graph (read-only).
    #[must_use]
    pub const fn as_petgraph(&self) -> &UnGraph<String, RouteEdge> {
        &self.graph
    }

    /// Content revision of this graph, identical to the repository revision
    /// of a snapshot holding the same cities and routes.
    #[must_use]
    pub fn content_hash(&self) -> Revision {
        Revision::of(&self.cities, &self.routes)
    }

    pub(crate) fn coordinates_at(&self, node: usize) -> Option<Coordinates> {
        self.coordinates.get(node).copied().flatten()
    }

    /// Edge endpoints as node positions (lexical city ranks).
    pub(crate) fn edge_endpoints(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index()))
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_city(city: &City) -> Result<(), DataIntegrityError> {
    if city.id.trim().is_empty() {
        return Err(DataIntegrityError::EmptyCityId);
    }
    let invalid = || DataIntegrityError::InvalidCoordinates {
        city_id: city.id.clone(),
        latitude: city.latitude,
        longitude: city.longitude,
    };
    match (city.latitude, city.longitude, city.coordinates()) {
        (None, None, _) => Ok(()),
        (_, _, Some(coords)) if coords.is_valid() => Ok(()),
        _ => Err(invalid()),
    }
}

fn lookup_endpoint(
    node_map: &HashMap<String, NodeIndex>,
    route: &Route,
    city_id: &str,
) -> Result<NodeIndex, DataIntegrityError> {
    node_map
        .get(city_id)
        .copied()
        .ok_or_else(|| DataIntegrityError::UnknownCity {
            city_id: city_id.to_string(),
            from: route.from.clone(),
            to: route.to.clone(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
