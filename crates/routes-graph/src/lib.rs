#![forbid(unsafe_code)]
//! routes-graph library.
//!
//! Connectivity analysis over the transport network: build a validated
//! [`graph::RouteGraph`], partition it into components, report on it, and
//! plan the cheapest set of synthetic routes that joins every component.
//! [`service::ConnectivityService`] ties these to a
//! [`routes_core::repository::RouteRepository`].
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums; see [`service::ConnectivityError`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod graph;
pub mod service;

pub use graph::{
    AugmentationPlan, ConnectivityReport, LinkReason, Partition, RouteGraph, SyntheticLink,
    plan_augmentation,
};
pub use service::{
    AddedConnection, AugmentationPreview, ConnectivityError, ConnectivityService, GuaranteeOutcome,
};
