//! Starting workers.
//!
//! The coordinator only talks to workers through [`WorkerLink`] and a
//! [`LineReader`] of responses, so anything that speaks the line protocol
//! can stand in for a subprocess.

use super::ipc::LineReader;
use super::proc::Proc;
use super::protocol::WorkRequest;
use super::signals::TerminationReason;
use crate::error::{ParminError, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Hidden flag that turns the binary into a worker.
pub const WORKER_FLAG: &str = "--internal-worker";

/// Request side of a worker.
pub trait WorkerLink: Send {
    /// Name used in logs and fault diagnostics.
    fn label(&self) -> String;

    fn send(&mut self, request: &WorkRequest) -> Result<()>;

    /// Ask the worker to exit, forcing it after `timeout`.
    fn stop(&mut self, timeout: Duration) -> Result<()>;

    fn kill(&mut self) -> Result<()>;

    /// How the worker ended, waiting up to `timeout` for it to finish.
    fn termination(&mut self, timeout: Duration) -> TerminationReason;
}

/// A freshly started worker.
pub struct SpawnedWorker {
    pub link: Box<dyn WorkerLink>,
    pub responses: LineReader,
}

/// Creates workers on demand.
pub trait WorkerSpawner {
    fn spawn(&mut self, id: usize) -> Result<SpawnedWorker>;
}

/// Starts workers by re-executing a binary with [`WORKER_FLAG`].
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    exe: PathBuf,
    envs: Vec<(String, String)>,
}

impl ProcessSpawner {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            envs: Vec::new(),
        }
    }

    /// Spawner for the running executable.
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| {
            ParminError::Worker(format!("failed to locate current executable: {}", e))
        })?;
        Ok(Self::new(exe))
    }

    /// Extra environment for every worker.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl WorkerSpawner for ProcessSpawner {
    fn spawn(&mut self, id: usize) -> Result<SpawnedWorker> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg(WORKER_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // worker logs share the coordinator's stderr
            .stderr(Stdio::inherit())
            .env("PARMIN_WORKER_ID", id.to_string());
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        let child = cmd
            .spawn()
            .map_err(|e| ParminError::Worker(format!("failed to spawn worker {}: {}", id, e)))?;
        let (proc, responses) = Proc::from_child(id, child)?;
        tracing::debug!(worker_id = id, pid = %proc.pid(), "Spawned worker process");

        Ok(SpawnedWorker {
            link: Box::new(proc),
            responses,
        })
    }
}

/// Stack size for response reader threads.
pub const READER_STACK_SIZE: usize = 256 * 1024;

/// Start a named thread that drains one worker's responses.
pub fn spawn_reader_thread<F>(name: String, f: F) -> Result<std::thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name)
        .stack_size(READER_STACK_SIZE)
        .spawn(f)
        .map_err(|e| ParminError::Worker(format!("failed to start reader thread: {}", e)))
}
