//! Property tests over random networks.
//!
//! Every generated network is checked against two independent component
//! counts: petgraph's `connected_components` and a plain BFS over an
//! adjacency list.

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::algo::connected_components;
use proptest::prelude::*;
use routes_core::config::ConnectivityConfig;
use routes_core::model::{City, Route};
use routes_core::repository::InMemoryRouteRepository;
use routes_graph::{ConnectivityReport, ConnectivityService, Partition, RouteGraph};

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// A valid network: `n` cities (some located), routes between distinct
/// declared cities.
fn arb_network() -> impl Strategy<Value = (Vec<City>, Vec<Route>)> {
    (0usize..24).prop_flat_map(|n| {
        let cities = prop::collection::vec(
            prop::option::of((-80.0f64..80.0, -179.0f64..179.0)),
            n,
        )
        .prop_map(|coords| {
            coords
                .into_iter()
                .enumerate()
                .map(|(i, xy)| match xy {
                    Some((lat, lon)) => City::located(format!("c{i:02}"), lat, lon),
                    None => City::new(format!("c{i:02}")),
                })
                .collect::<Vec<_>>()
        });
        let edges = if n < 2 {
            Just(Vec::new()).boxed()
        } else {
            prop::collection::vec((0..n, 0..n, 0.0f64..1_000.0), 0..(n * 2))
                .prop_map(|raw| {
                    raw.into_iter()
                        .filter(|(a, b, _)| a != b)
                        .map(|(a, b, w)| Route::new(format!("c{a:02}"), format!("c{b:02}"), w, "rail"))
                        .collect::<Vec<_>>()
                })
                .boxed()
        };
        (cities, edges)
    })
}

// ---------------------------------------------------------------------------
// Reference implementation
// ---------------------------------------------------------------------------

fn bfs_component_count(cities: &[City], routes: &[Route]) -> usize {
    let mut adjacency: HashMap<&str, Vec<&str>> = cities
        .iter()
        .map(|c| (c.id.as_str(), Vec::new()))
        .collect();
    for r in routes {
        adjacency.entry(r.from.as_str()).or_default().push(r.to.as_str());
        adjacency.entry(r.to.as_str()).or_default().push(r.from.as_str());
    }

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut count = 0;
    for city in cities {
        if !seen.insert(city.id.as_str()) {
            continue;
        }
        count += 1;
        let mut queue = VecDeque::from([city.id.as_str()]);
        while let Some(current) = queue.pop_front() {
            for &next in &adjacency[current] {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    count
}

fn build(cities: &[City], routes: &[Route]) -> RouteGraph {
    RouteGraph::from_parts(cities.to_vec(), routes.to_vec()).expect("generated network is valid")
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn component_count_matches_references((cities, routes) in arb_network()) {
        let graph = build(&cities, &routes);
        let partition = Partition::find(&graph);
        prop_assert_eq!(partition.component_count(), connected_components(graph.as_petgraph()));
        prop_assert_eq!(partition.component_count(), bfs_component_count(&cities, &routes));
    }

    #[test]
    fn components_cover_each_city_once((cities, routes) in arb_network()) {
        let graph = build(&cities, &routes);
        let partition = Partition::find(&graph);

        let mut all: Vec<&str> = partition
            .components()
            .iter()
            .flat_map(|c| c.members.iter().map(String::as_str))
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        prop_assert_eq!(total, cities.len());
        prop_assert_eq!(all.len(), cities.len());

        for component in partition.components() {
            for member in &component.members {
                prop_assert_eq!(partition.component_of(member), Some(component.id));
            }
        }
    }

    #[test]
    fn isolated_cities_are_exactly_those_without_routes((cities, routes) in arb_network()) {
        let graph = build(&cities, &routes);
        let report = ConnectivityReport::new(&Partition::find(&graph), graph.city_count());

        let touched: BTreeSet<&str> = routes
            .iter()
            .flat_map(|r| [r.from.as_str(), r.to.as_str()])
            .collect();
        let mut expected: Vec<String> = cities
            .iter()
            .filter(|c| !touched.contains(c.id.as_str()))
            .map(|c| c.id.clone())
            .collect();
        expected.sort_unstable();
        prop_assert_eq!(report.isolated_cities, expected);
    }

    #[test]
    fn partition_ignores_input_order((cities, routes) in arb_network()) {
        let forward = Partition::find(&build(&cities, &routes));
        let mut rev_cities = cities.clone();
        rev_cities.reverse();
        let mut rev_routes = routes.clone();
        rev_routes.reverse();
        let backward = Partition::find(&build(&rev_cities, &rev_routes));
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn guarantee_adds_minimal_routes_and_connects((cities, routes) in arb_network()) {
        let svc = ConnectivityService::new(
            InMemoryRouteRepository::new(cities, routes),
            ConnectivityConfig::default(),
        );
        let before = svc.get_connectivity_status().expect("status");

        let outcome = svc.guarantee_connectivity().expect("guarantee");
        prop_assert!(outcome.is_connected);
        prop_assert_eq!(
            outcome.added_connections.len(),
            before.component_count.saturating_sub(1)
        );

        let after = svc.get_connectivity_status().expect("status");
        prop_assert!(after.is_connected);
        prop_assert!(after.component_count <= 1);

        let again = svc.guarantee_connectivity().expect("second guarantee");
        prop_assert!(again.added_connections.is_empty());
    }
}
