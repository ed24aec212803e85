#![forbid(unsafe_code)]
//! routes-core library.
//!
//! Domain types for the transport network ([`model::City`],
//! [`model::Route`], [`model::GraphSnapshot`]), the [`repository::RouteRepository`]
//! seam the connectivity service reads and writes through, and the SQLite
//! store that implements it.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at the library seams
//!   ([`error::DataIntegrityError`], [`error::RepositoryError`]); `anyhow::Result`
//!   for setup code such as opening the store or loading config.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod repository;
