//! MSPSRpi catalog site library.
//!
//! Catalog loading, the catalog service and the JSON API. The main entry
//! point for running the server is the `mspsrpi` binary; the library is
//! exposed for integration testing and for the CLI.

pub mod catalog;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
