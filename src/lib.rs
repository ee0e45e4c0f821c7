//! Daily math challenge backend.
//!
//! The challenge progress engine (`engine`) is pure and synchronous; everything
//! else wires it to storage, an optional photo grader, and an HTTP API.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod grading;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod share;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
