//! Connected components of the transport network.
//!
//! # Algorithm
//!
//! Union-find (petgraph's [`UnionFind`], path compression + union by rank)
//! over node positions, unioning both endpoints of every route. Runs in
//! `O(C + R · α(C))`.
//!
//! # Numbering
//!
//! Cities are visited in lexical order (node index order, see
//! [`RouteGraph`]). The first time a root is seen it gets the next component
//! id, so component `0` holds the smallest city id, component `1` the
//! smallest id not in component `0`, and so on. Members are pushed in the
//! same order and are therefore already sorted.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;
use tracing::{debug, instrument};

use crate::graph::build::RouteGraph;

/// One connected component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Position in [`Partition::components`].
    pub id: usize,
    /// Member city ids, sorted.
    pub members: Vec<String>,
    /// Node positions of the members, in the same order as `members`.
    pub(crate) nodes: Vec<usize>,
}

impl Component {
    /// Return `true` if this component is a single city with no route.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// The smallest member id.
    #[must_use]
    pub fn representative(&self) -> &str {
        self.members
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Assignment of every city to exactly one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    components: Vec<Component>,
    component_of: HashMap<String, usize>,
}

impl Partition {
    /// Partition `graph` into connected components.
    #[must_use]
    #[instrument(skip(graph), fields(cities = graph.city_count(), routes = graph.route_count()))]
    pub fn find(graph: &RouteGraph) -> Self {
        let n = graph.city_count();
        let mut sets = UnionFind::<usize>::new(n);
        for (a, b) in graph.edge_endpoints() {
            sets.union(a, b);
        }

        let mut root_to_component: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Component> = Vec::new();
        let mut component_of: HashMap<String, usize> = HashMap::with_capacity(n);

        for (node, city_id) in graph.city_ids().enumerate() {
            let root = sets.find_mut(node);
            let id = match root_to_component.get(&root) {
                Some(&id) => id,
                None => {
                    let id = components.len();
                    components.push(Component {
                        id,
                        members: Vec::new(),
                        nodes: Vec::new(),
                    });
                    root_to_component.insert(root, id);
                    id
                }
            };
            components[id].members.push(city_id.to_string());
            components[id].nodes.push(node);
            component_of.insert(city_id.to_string(), id);
        }

        debug!(components = components.len(), "partition computed");
        Self {
            components,
            component_of,
        }
    }

    /// Number of components. Zero for an empty graph.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Return `true` if there is at most one component.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.components.len() <= 1
    }

    /// Components in numbering order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component id of `city_id`, if the city is known.
    #[must_use]
    pub fn component_of(&self, city_id: &str) -> Option<usize> {
        self.component_of.get(city_id).copied()
    }

    /// Total number of cities across all components.
    #[must_use]
    pub fn city_count(&self) -> usize {
        self.component_of.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
