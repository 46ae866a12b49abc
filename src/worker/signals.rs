//! Why a worker stopped.
//!
//! Used to word the fault diagnostic when a worker goes away with jobs still
//! assigned to it.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use std::fmt;

/// How a worker process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    Exited(i32),
    Signaled(Signal),
    /// SIGKILL, usually from the OOM killer.
    OutOfMemory,
    /// SIGSEGV on Linux, SIGBUS on macOS.
    StackOverflow(Signal),
    /// The process has not been reaped yet.
    StillAlive,
    Unknown,
}

impl TerminationReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {}", code),
            Self::Signaled(sig) => write!(f, "killed by signal {:?}", sig),
            Self::OutOfMemory => write!(f, "was killed (SIGKILL, possibly out of memory)"),
            Self::StackOverflow(sig) => write!(f, "crashed ({:?}, possibly stack overflow)", sig),
            Self::StillAlive => write!(f, "was still running"),
            Self::Unknown => write!(f, "stopped for an unknown reason"),
        }
    }
}

/// Classify a `waitpid` result.
pub fn analyze_wait_status(status: WaitStatus) -> TerminationReason {
    match status {
        WaitStatus::Exited(_, code) => TerminationReason::Exited(code),
        WaitStatus::Signaled(_, Signal::SIGKILL, _) => TerminationReason::OutOfMemory,
        WaitStatus::Signaled(_, sig @ (Signal::SIGSEGV | Signal::SIGBUS), _) => {
            TerminationReason::StackOverflow(sig)
        }
        WaitStatus::Signaled(_, sig, _) => TerminationReason::Signaled(sig),
        WaitStatus::StillAlive => TerminationReason::StillAlive,
        _ => TerminationReason::Unknown,
    }
}

/// A worker-level failure, reported once as a batch error.
#[derive(Debug, Clone)]
pub struct WorkerFailure {
    pub worker: String,
    pub reason: Option<TerminationReason>,
    /// Files whose jobs were in flight on the worker, in send order.
    pub in_flight: Vec<String>,
    pub message: Option<String>,
}

impl WorkerFailure {
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            reason: None,
            in_flight: Vec::new(),
            message: None,
        }
    }

    pub fn with_reason(mut self, reason: TerminationReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_in_flight(mut self, files: Vec<String>) -> Self {
        self.in_flight = files;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.worker)?;
        if let Some(reason) = &self.reason {
            write!(f, " {}", reason)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if !self.in_flight.is_empty() {
            write!(f, " while processing {}", self.in_flight.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::Pid;

    #[test]
    fn test_analyze_wait_status() {
        let pid = Pid::from_raw(1);
        assert_eq!(
            analyze_wait_status(WaitStatus::Exited(pid, 0)),
            TerminationReason::Exited(0)
        );
        assert_eq!(
            analyze_wait_status(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            TerminationReason::OutOfMemory
        );
        assert_eq!(
            analyze_wait_status(WaitStatus::Signaled(pid, Signal::SIGSEGV, true)),
            TerminationReason::StackOverflow(Signal::SIGSEGV)
        );
        assert_eq!(
            analyze_wait_status(WaitStatus::Signaled(pid, Signal::SIGTERM, false)),
            TerminationReason::Signaled(Signal::SIGTERM)
        );
        assert_eq!(
            analyze_wait_status(WaitStatus::StillAlive),
            TerminationReason::StillAlive
        );
    }

    #[test]
    fn test_is_clean() {
        assert!(TerminationReason::Exited(0).is_clean());
        assert!(!TerminationReason::Exited(1).is_clean());
        assert!(!TerminationReason::OutOfMemory.is_clean());
    }

    #[test]
    fn test_failure_display() {
        let failure = WorkerFailure::new("worker 2 (pid 4242)")
            .with_reason(TerminationReason::Exited(101))
            .with_in_flight(vec!["main.js".into(), "vendor.js".into()]);
        assert_eq!(
            failure.to_string(),
            "worker 2 (pid 4242) exited with code 101 while processing main.js, vendor.js"
        );

        let failure = WorkerFailure::new("worker 0").with_message("sent an invalid response");
        assert_eq!(failure.to_string(), "worker 0: sent an invalid response");

        let failure = WorkerFailure::new("worker 1")
            .with_reason(TerminationReason::Unknown)
            .with_message("broken pipe");
        assert_eq!(
            failure.to_string(),
            "worker 1 stopped for an unknown reason: broken pipe"
        );
    }
}
