//! In-process workers for pool tests.
//!
//! Each worker is a thread running [`worker_loop`] over real pipes, so the
//! coordinator sees exactly the wire traffic a subprocess would produce.

use super::ipc::{LineReader, LineWriter, pipe};
use super::protocol::WorkRequest;
use super::signals::TerminationReason;
use super::spawn::{SpawnedWorker, WorkerLink, WorkerSpawner};
use super::worker_main::worker_loop;
use crate::engine::{EngineError, OxcEngine, TransformEngine, TransformOutput, TransformRequest, WarningSink};
use crate::error::{ParminError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// `(worker id, file)` for every job a worker started, in start order.
pub type JobLog = Arc<Mutex<Vec<(usize, String)>>>;

struct Recording {
    worker: usize,
    log: JobLog,
}

impl TransformEngine for Recording {
    fn minify(
        &self,
        request: &TransformRequest<'_>,
        sink: &mut dyn WarningSink,
    ) -> std::result::Result<TransformOutput, EngineError> {
        self.log
            .lock()
            .unwrap()
            .push((self.worker, request.file.to_string()));
        OxcEngine.minify(request, sink)
    }
}

pub struct ThreadLink {
    id: usize,
    writer: Option<LineWriter>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadLink {
    fn join(&mut self) {
        self.writer = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl WorkerLink for ThreadLink {
    fn label(&self) -> String {
        format!("worker {} (thread)", self.id)
    }

    fn send(&mut self, request: &WorkRequest) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ParminError::Worker("worker already stopped".into()))?;
        writer
            .write_line(&request.to_line())
            .map_err(|e| ParminError::Worker(format!("failed to send to {}: {}", self.id, e)))
    }

    fn stop(&mut self, _timeout: Duration) -> Result<()> {
        let _ = self.send(&WorkRequest::Exit);
        self.join();
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        self.join();
        Ok(())
    }

    fn termination(&mut self, timeout: Duration) -> TerminationReason {
        let start = Instant::now();
        while self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            if start.elapsed() >= timeout {
                return TerminationReason::StillAlive;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        TerminationReason::Exited(0)
    }
}

/// Spawns thread workers and records what they were asked to do.
#[derive(Default)]
pub struct ThreadSpawner {
    pub log: JobLog,
    pub spawned: Vec<usize>,
    /// Workers that read one request and then vanish without replying.
    vanishing: HashSet<usize>,
    /// Spawn attempts for these ids fail.
    broken: HashSet<usize>,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vanishing(mut self, id: usize) -> Self {
        self.vanishing.insert(id);
        self
    }

    pub fn broken(mut self, id: usize) -> Self {
        self.broken.insert(id);
        self
    }

    /// Files each worker started, grouped by worker id.
    pub fn files_of(log: &JobLog, worker: usize) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == worker)
            .map(|(_, file)| file.clone())
            .collect()
    }
}

impl WorkerSpawner for ThreadSpawner {
    fn spawn(&mut self, id: usize) -> Result<SpawnedWorker> {
        if self.broken.contains(&id) {
            return Err(ParminError::Worker(format!("failed to spawn worker {}", id)));
        }
        self.spawned.push(id);

        let (req_read, req_write) = pipe()?;
        let (resp_read, resp_write) = pipe()?;
        let engine = Recording {
            worker: id,
            log: Arc::clone(&self.log),
        };
        let vanish = self.vanishing.contains(&id);

        let handle = std::thread::Builder::new()
            .name(format!("test-worker-{}", id))
            .spawn(move || {
                let mut reader = LineReader::new(req_read);
                let mut writer = LineWriter::new(resp_write);
                if vanish {
                    if let Ok(Some(line)) = reader.read_line()
                        && let Ok(WorkRequest::Job(job)) = WorkRequest::from_line(line)
                    {
                        engine.log.lock().unwrap().push((id, job.file));
                    }
                    return;
                }
                let _ = worker_loop(&engine, &mut reader, &mut writer);
            })?;

        Ok(SpawnedWorker {
            link: Box::new(ThreadLink {
                id,
                writer: Some(LineWriter::new(req_write)),
                handle: Some(handle),
            }),
            responses: LineReader::new(resp_read),
        })
    }
}
