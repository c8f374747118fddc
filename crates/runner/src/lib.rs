//! Process, socket and clock handling for load-test runs.
//!
//! [`RunSupervisor`] owns the single active-run slot. Around it:
//! [`health`] checks workers before launch, [`engine`] builds and spawns the
//! engine process, [`relay`] forwards its output to the run log, and
//! [`transfer`] waits for replicated result data to settle once the engine
//! has exited.

pub mod clock;
pub mod compare;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod health;
pub mod journal;
pub mod relay;
pub mod supervisor;
pub mod transfer;

pub use config::{RunnerConfig, TransferSettings};
pub use supervisor::{
    LaunchRejected, RunCompletion, RunOutcome, RunStatus, RunSupervisor, StartedRun, StopError,
};
pub use transfer::{TransferOutcome, TransferReport};
