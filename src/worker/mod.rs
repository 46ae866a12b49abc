//! Worker processes.
//!
//! A worker is the same `parmin` binary started with `--internal-worker`.
//! It reads one [`WorkRequest`] per line on stdin and answers every job
//! with exactly one [`WorkResponse`] line on stdout.
//!
//! ```text
//!                  ┌──────────────────────┐
//!                  │     Coordinator      │
//!                  │  round-robin + count │
//!                  └──────────┬───────────┘
//!        Job lines (stdin)    │     Response lines (stdout)
//!              ┌──────────────┼──────────────┐
//!        ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!        │ worker 0  │  │ worker 1  │  │ worker N  │
//!        │  engine   │  │  engine   │  │  engine   │
//!        └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! Jobs queued on one worker are answered in the order they were sent.

pub mod ipc;
pub mod job;
pub mod proc;
pub mod protocol;
pub mod signals;
pub mod spawn;
#[cfg(test)]
pub(crate) mod thread;
pub mod worker_main;

pub use protocol::{Job, JobError, JobWarning, Response, WorkRequest, WorkResponse};
pub use signals::{TerminationReason, WorkerFailure};
pub use spawn::{ProcessSpawner, SpawnedWorker, WORKER_FLAG, WorkerLink, WorkerSpawner};
pub use worker_main::run_worker_main;
