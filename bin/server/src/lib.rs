//! procureflix HTTP server.
//!
//! A thin JSON surface over the approval service, for the demo deployment.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
