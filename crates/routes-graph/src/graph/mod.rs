//! Transport network graph module.
//!
//! # Overview
//!
//! This module turns a repository snapshot into a validated undirected
//! petgraph graph and runs the connectivity pipeline over it.
//!
//! ## Pipeline
//!
//! ```text
//! GraphSnapshot (cities, routes, revision)
//!        ↓  build::RouteGraph::from_snapshot()      # rejects bad data
//! RouteGraph (UnGraph, nodes in lexical city order)
//!        ↓  partition::Partition::find()            # union-find
//! Partition (components numbered by smallest member)
//!        ├─ report::ConnectivityReport::new()       # public report
//!        └─ augment::plan_augmentation()            # spanning tree over components
//!               ↓
//!           AugmentationPlan (k - 1 synthetic routes)
//! ```
//!
//! ## Determinism
//!
//! Cities are added to the petgraph graph sorted by id, so node index order
//! is lexical order. Every later stage iterates in node-index order and
//! breaks ties on ids, so identical input always produces identical
//! components and identical plans.
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! use routes_graph::graph::{RouteGraph, Partition, ConnectivityReport, plan_augmentation};
//!
//! let graph = RouteGraph::from_snapshot(&snapshot)?;
//! let partition = Partition::find(&graph);
//! let report = ConnectivityReport::new(&partition, graph.city_count());
//! if !report.is_connected {
//!     let plan = plan_augmentation(&graph, &partition, &config);
//!     println!("{} synthetic routes needed", plan.len());
//! }
//! ```

pub mod augment;
pub mod build;
pub mod partition;
pub mod report;

// Re-export primary types at module level for convenience.
pub use augment::{AugmentationPlan, LinkReason, SyntheticLink, plan_augmentation};
pub use build::RouteGraph;
pub use partition::{Component, Partition};
pub use report::ConnectivityReport;
