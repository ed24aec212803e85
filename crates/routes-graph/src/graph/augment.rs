//! Minimal augmentation: the cheapest synthetic routes that join every
//! component.
//!
//! # Algorithm
//!
//! 1. Each component is a super-node. The cost between components `A` and
//!    `B` is the smallest great-circle distance (km) between a located city
//!    of `A` and a located city of `B`. If either side has no located city
//!    the cost is the configured fallback constant.
//! 2. A minimum spanning tree over the complete component graph picks
//!    `k - 1` edges for `k` components. It is built with dense Prim, which
//!    keeps one best link per component instead of all `k(k-1)/2`
//!    candidates. Memory is `O(k)`. Time is `O(k^2)` cost evaluations, and
//!    each one compares every located pair across the two components, so
//!    very large located components are the expensive case.
//! 3. Each picked edge becomes one synthetic [`Route`] whose weight is its
//!    cost.
//!
//! # Tie-breaks
//!
//! - Between two components, equal-distance city pairs resolve to the
//!   smallest `(from, to)` where `from` is in the lower-numbered component.
//!   With the fallback cost the pair is the two components' smallest ids.
//! - Across component pairs, equal costs are processed in ascending
//!   `(component_a, component_b)` order.
//!
//! The fallback constant and distances share one cost scale, so a fallback
//! link can be preferred over a long measured one; pick the fallback cost
//! accordingly.

use std::cmp::Ordering;

use routes_core::config::ConnectivityConfig;
use routes_core::model::{Coordinates, Route};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::graph::build::RouteGraph;
use crate::graph::partition::Partition;

/// Why a synthetic link was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkReason {
    /// Closest located pair across the two components.
    Nearest,
    /// No located pair existed; the fallback cost was used.
    Fallback,
}

/// One synthetic route and the components it merges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticLink {
    pub route: Route,
    /// `(a, b)` with `a < b`, component ids of the pre-augmentation partition.
    pub components: (usize, usize),
    pub reason: LinkReason,
}

/// Ordered synthetic routes that make the network connected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AugmentationPlan {
    links: Vec<SyntheticLink>,
}

impl AugmentationPlan {
    /// Links in ascending `(cost, component_a, component_b)` order.
    #[must_use]
    pub fn links(&self) -> &[SyntheticLink] {
        &self.links
    }

    /// The synthetic routes alone, in plan order.
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        self.links.iter().map(|l| l.route.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Sum of synthetic route weights.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.links.iter().map(|l| l.route.weight).sum()
    }
}

/// A potential inter-component link, by node position.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    a: usize,
    b: usize,
    from: usize,
    to: usize,
    reason: LinkReason,
}

/// Plan the synthetic routes that join every component of `partition`.
///
/// Returns an empty plan when the partition is already connected. Never
/// fails: a spanning tree over a non-empty component list always exists.
#[must_use]
#[instrument(skip_all, fields(components = partition.component_count()))]
pub fn plan_augmentation(
    graph: &RouteGraph,
    partition: &Partition,
    config: &ConnectivityConfig,
) -> AugmentationPlan {
    let components = partition.components();
    let k = components.len();
    if k <= 1 {
        return AugmentationPlan::default();
    }

    let fallback_cost = sanitize_fallback(config.fallback_cost);

    // Located members per component, in lexical order.
    let located: Vec<Vec<(usize, Coordinates)>> = components
        .iter()
        .map(|c| {
            c.nodes
                .iter()
                .filter_map(|&n| graph.coordinates_at(n).map(|xy| (n, xy)))
                .collect()
        })
        .collect();

    let candidate = |a: usize, b: usize| match closest_pair(&located[a], &located[b]) {
        Some((cost, from, to)) => Candidate {
            cost,
            a,
            b,
            from,
            to,
            reason: LinkReason::Nearest,
        },
        None => Candidate {
            cost: fallback_cost,
            a,
            b,
            from: components[a].nodes[0],
            to: components[b].nodes[0],
            reason: LinkReason::Fallback,
        },
    };

    // Dense Prim from component 0. `cheapest[v]` is the best known link from
    // the tree to `v`, or `None` once `v` has joined.
    let mut cheapest: Vec<Option<Candidate>> = (0..k)
        .map(|v| (v > 0).then(|| candidate(0, v)))
        .collect();
    let mut accepted: Vec<Candidate> = Vec::with_capacity(k - 1);
    loop {
        let Some((joined, link)) = cheapest
            .iter()
            .enumerate()
            .filter_map(|(v, c)| c.as_ref().map(|c| (v, *c)))
            .min_by(|(_, x), (_, y)| candidate_order(x, y))
        else {
            break;
        };
        cheapest[joined] = None;
        accepted.push(link);
        for (w, slot) in cheapest.iter_mut().enumerate() {
            if let Some(current) = slot {
                let via = candidate(joined.min(w), joined.max(w));
                if candidate_order(&via, current).is_lt() {
                    *current = via;
                }
            }
        }
    }

    // Report links in ascending (cost, a, b), the order a sorted-edge
    // Kruskal would accept them.
    accepted.sort_by(candidate_order);
    let links: Vec<SyntheticLink> = accepted
        .into_iter()
        .map(|c| SyntheticLink {
            route: Route::new(
                city_at(graph, c.from),
                city_at(graph, c.to),
                c.cost,
                config.synthetic_transport.clone(),
            ),
            components: (c.a, c.b),
            reason: c.reason,
        })
        .collect();

    debug!(links = links.len(), "augmentation planned");
    AugmentationPlan { links }
}

/// Closest located pair `(cost, from, to)` with `from` in `left`.
///
/// Both slices are in lexical order and only a strictly smaller distance
/// replaces the current best, so ties keep the smallest `(from, to)`.
fn closest_pair(
    left: &[(usize, Coordinates)],
    right: &[(usize, Coordinates)],
) -> Option<(f64, usize, usize)> {
    let mut best: Option<(f64, usize, usize)> = None;
    for &(from, p) in left {
        for &(to, q) in right {
            let d = p.distance_km(&q);
            if best.is_none_or(|(cost, _, _)| d < cost) {
                best = Some((d, from, to));
            }
        }
    }
    best
}

/// Total order on candidate links: `(cost, a, b)`. Every component pair
/// appears once, so the minimum spanning tree under this order is unique.
fn candidate_order(x: &Candidate, y: &Candidate) -> Ordering {
    x.cost
        .total_cmp(&y.cost)
        .then_with(|| x.a.cmp(&y.a))
        .then_with(|| x.b.cmp(&y.b))
}

fn city_at(graph: &RouteGraph, node: usize) -> String {
    graph.cities()[node].id.clone()
}

fn sanitize_fallback(cost: f64) -> f64 {
    if cost.is_finite() && cost >= 0.0 {
        cost
    } else {
        let default = ConnectivityConfig::default().fallback_cost;
        warn!(cost, default, "invalid fallback cost; using default");
        default
    }
}
