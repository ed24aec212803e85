//! Public connectivity report.
//!
//! Serialized in camelCase, matching the body of
//! `GET /smart-routes/connectivity`:
//!
//! ```json
//! {"isConnected": false, "componentCount": 3,
//!  "components": [["A", "B"], ["C"], ["D"]], "isolatedCities": ["C", "D"]}
//! ```

use serde::{Deserialize, Serialize};

use crate::graph::partition::Partition;

/// Whether every city can reach every other city, and if not, how the
/// network splits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityReport {
    /// `true` iff there is at most one component. A network of zero or one
    /// city is trivially connected.
    pub is_connected: bool,
    pub component_count: usize,
    /// Member ids per component, in component numbering order.
    pub components: Vec<Vec<String>>,
    /// Sorted ids of cities with no route at all.
    pub isolated_cities: Vec<String>,
}

impl ConnectivityReport {
    /// Turn a partition of a graph with `city_count` cities into a report.
    #[must_use]
    pub fn new(partition: &Partition, city_count: usize) -> Self {
        debug_assert_eq!(partition.city_count(), city_count);

        let components: Vec<Vec<String>> = partition
            .components()
            .iter()
            .map(|c| c.members.clone())
            .collect();

        let mut isolated_cities: Vec<String> = partition
            .components()
            .iter()
            .filter(|c| c.is_singleton())
            .map(|c| c.representative().to_string())
            .collect();
        isolated_cities.sort_unstable();

        Self {
            is_connected: city_count <= 1 || partition.component_count() == 1,
            component_count: partition.component_count(),
            components,
            isolated_cities,
        }
    }
}
