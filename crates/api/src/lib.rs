//! Load-test orchestrator HTTP server library.
//!
//! Exposes config, state, error handling and routes so integration tests and
//! the binary entrypoint can both build the same application.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
