//! Domain logic for the load-test orchestrator.
//!
//! Everything in this crate is free of process, socket and clock handling so
//! it can be tested in isolation. The runner and API crates build on it.

pub mod error;
pub mod logging;
pub mod notification;
pub mod reports;
pub mod result_file;
pub mod run;
pub mod test_plans;
pub mod transfer;
pub mod types;
pub mod worker;
