//! Handle to a worker subprocess.
//!
//! The coordinator keeps the request side of the pipe pair here; the
//! response side goes to a reader thread (see [`super::spawn`]).

use super::ipc::{LineReader, LineWriter, PipeFd};
use super::protocol::WorkRequest;
use super::signals::{TerminationReason, analyze_wait_status};
use super::spawn::WorkerLink;
use crate::error::{ParminError, Result};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::os::unix::io::OwnedFd;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running worker subprocess.
pub struct Proc {
    pid: Pid,
    id: usize,
    writer: LineWriter,
    /// Set once the process has been reaped.
    exit: Option<WaitStatus>,
}

impl Proc {
    /// Wrap a spawned child, returning the handle and the reader for its
    /// stdout.
    pub fn from_child(id: usize, mut child: std::process::Child) -> Result<(Self, LineReader)> {
        let pid = Pid::from_raw(child.id() as i32);
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ParminError::Worker("child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ParminError::Worker("child stdout not captured".into()))?;

        let proc = Self {
            pid,
            id,
            writer: LineWriter::new(PipeFd::new(OwnedFd::from(stdin))),
            exit: None,
        };
        Ok((proc, LineReader::new(PipeFd::new(OwnedFd::from(stdout)))))
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Non-blocking reap. `None` while the process is running.
    pub fn try_wait(&mut self) -> Result<Option<WaitStatus>> {
        if let Some(status) = self.exit {
            return Ok(Some(status));
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(status) => {
                self.exit = Some(status);
                Ok(Some(status))
            }
            Err(e) => Err(ParminError::Worker(format!(
                "waitpid failed for {}: {}",
                self.label(),
                e
            ))),
        }
    }

    fn wait_for(&mut self, timeout: Duration) -> Option<WaitStatus> {
        let start = Instant::now();
        loop {
            match self.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) if start.elapsed() < timeout => std::thread::sleep(POLL_INTERVAL),
                _ => return None,
            }
        }
    }

    /// Send SIGTERM.
    pub fn terminate(&self) -> Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        signal::kill(self.pid, Signal::SIGTERM)
            .map_err(|e| ParminError::Worker(format!("failed to send SIGTERM: {}", e)))
    }
}

impl WorkerLink for Proc {
    fn label(&self) -> String {
        format!("worker {} (pid {})", self.id, self.pid)
    }

    fn send(&mut self, request: &WorkRequest) -> Result<()> {
        self.writer
            .write_line(&request.to_line())
            .map_err(|e| ParminError::Worker(format!("failed to send to {}: {}", self.label(), e)))
    }

    /// Ask politely with `Exit`, then SIGTERM, then SIGKILL.
    fn stop(&mut self, timeout: Duration) -> Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        let _ = self.send(&WorkRequest::Exit);
        if self.wait_for(timeout).is_some() {
            return Ok(());
        }

        let _ = self.terminate();
        if self.wait_for(Duration::from_millis(100)).is_some() {
            return Ok(());
        }
        self.kill()
    }

    fn kill(&mut self) -> Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        signal::kill(self.pid, Signal::SIGKILL)
            .map_err(|e| ParminError::Worker(format!("failed to send SIGKILL: {}", e)))?;
        match waitpid(self.pid, None) {
            Ok(status) => {
                self.exit = Some(status);
                Ok(())
            }
            Err(e) => Err(ParminError::Worker(format!("waitpid failed: {}", e))),
        }
    }

    fn termination(&mut self, timeout: Duration) -> TerminationReason {
        match self.wait_for(timeout) {
            Some(status) => analyze_wait_status(status),
            None => TerminationReason::StillAlive,
        }
    }
}

impl Drop for Proc {
    fn drop(&mut self) {
        if self.exit.is_none() {
            let _ = self.terminate();
            if self.wait_for(POLL_INTERVAL).is_none() {
                let _ = signal::kill(self.pid, Signal::SIGKILL);
                let _ = waitpid(self.pid, None);
            }
        }
    }
}
