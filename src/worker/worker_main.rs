//! Worker subprocess entry point.
//!
//! Runs when the binary is started with `--internal-worker`: jobs arrive on
//! stdin, responses leave on stdout, logs go to stderr.

use super::ipc::{LineReader, LineWriter, PipeFd};
use super::job::run_job;
use super::protocol::{WorkRequest, WorkResponse};
use crate::engine::{OxcEngine, TransformEngine};
use crate::logging::{self, LogConfig, Role};
use std::io;
use tracing::{debug, error, warn};

/// Serve requests until `Exit` or EOF. Returns the number of jobs handled.
pub fn worker_loop(
    engine: &dyn TransformEngine,
    reader: &mut LineReader,
    writer: &mut LineWriter,
) -> io::Result<usize> {
    let mut handled = 0;
    loop {
        let Some(line) = reader.read_line()? else {
            debug!(jobs = handled, "Request pipe closed");
            return Ok(handled);
        };

        let request = match WorkRequest::from_line(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed request");
                let reply = WorkResponse::invalid(format!("Invalid request: {}", e));
                writer.write_line(&reply.to_line())?;
                continue;
            }
        };

        match request {
            WorkRequest::Exit => {
                debug!(jobs = handled, "Exit requested");
                return Ok(handled);
            }
            WorkRequest::Job(job) => {
                debug!(file = %job.file, bytes = job.input.len(), "Job received");
                let response = run_job(engine, job);
                writer.write_line(&WorkResponse::Done(response).to_line())?;
                handled += 1;
            }
        }
    }
}

/// Run the worker on stdin/stdout and exit the process.
pub fn run_worker_main() -> ! {
    // Broken pipes surface as io errors instead of killing the worker.
    unsafe {
        nix::sys::signal::signal(
            nix::sys::signal::Signal::SIGPIPE,
            nix::sys::signal::SigHandler::SigIgn,
        )
        .ok();
    }

    logging::init(LogConfig::new(Role::Worker).with_env_overrides());

    // Safety: fds 0 and 1 are this process's stdin/stdout and nothing else
    // in the worker touches them.
    let mut reader = LineReader::new(unsafe { PipeFd::from_raw(0) });
    let mut writer = LineWriter::new(unsafe { PipeFd::from_raw(1) });

    match worker_loop(&OxcEngine, &mut reader, &mut writer) {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            error!(error = %e, "Worker I/O failed");
            std::process::exit(1);
        }
    }
}
