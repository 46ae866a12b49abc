//! The worker pool owned by the coordinator.
//!
//! Workers are spawned lazily, one per assignment, until the pool reaches
//! its bound. Each worker gets a reader thread that turns its response
//! lines into [`PoolEvent`]s on a channel created fresh for every batch.

use crate::error::{ParminError, Result};
use crate::worker::ipc::LineReader;
use crate::worker::spawn::spawn_reader_thread;
use crate::worker::{
    Job, Response, TerminationReason, WorkRequest, WorkResponse, WorkerLink, WorkerSpawner,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// How long a worker gets to exit after `Exit` before it is signalled.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for a worker that closed its output to be reapable.
const REAP_TIMEOUT: Duration = Duration::from_millis(500);

/// Something a worker did, delivered to the coordination flow.
#[derive(Debug)]
pub enum PoolEvent {
    Response { worker: usize, response: Response },
    /// The worker broke the protocol or its pipe failed.
    Fault { worker: usize, message: String },
    /// The worker's output closed.
    Exited { worker: usize },
}

struct PoolWorker {
    link: Box<dyn WorkerLink>,
    reader: Option<JoinHandle<()>>,
    /// Files sent to this worker and not answered yet, in send order.
    in_flight: VecDeque<String>,
    faulted: bool,
    jobs: usize,
}

/// Bounded, lazily grown set of workers.
pub struct WorkerPool<S> {
    spawner: S,
    max: usize,
    workers: Vec<PoolWorker>,
    /// Assignment counter; wraps instead of overflowing.
    counter: usize,
    /// A spawn failed this batch; stop growing.
    spawn_failed: bool,
    events_tx: Sender<PoolEvent>,
    events_rx: Receiver<PoolEvent>,
}

fn read_responses(worker: usize, mut responses: LineReader, events: Sender<PoolEvent>) {
    loop {
        let event = match responses.read_line() {
            Ok(Some(line)) => match WorkResponse::from_line(line) {
                Ok(WorkResponse::Done(response)) => PoolEvent::Response { worker, response },
                Ok(WorkResponse::Invalid { message }) => PoolEvent::Fault {
                    worker,
                    message: format!("rejected a request: {}", message),
                },
                Err(e) => PoolEvent::Fault {
                    worker,
                    message: format!("sent an invalid response: {}", e),
                },
            },
            Ok(None) => break,
            Err(e) => {
                let _ = events.send(PoolEvent::Fault {
                    worker,
                    message: format!("response pipe failed: {}", e),
                });
                break;
            }
        };
        if events.send(event).is_err() {
            // batch is over and nobody is listening
            return;
        }
    }
    let _ = events.send(PoolEvent::Exited { worker });
}

impl<S: WorkerSpawner> WorkerPool<S> {
    pub fn new(spawner: S, max: usize) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            spawner,
            max: max.max(1),
            workers: Vec::new(),
            counter: 0,
            spawn_failed: false,
            events_tx,
            events_rx,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Reset per-batch state. Events still queued from an earlier batch are
    /// discarded with the old channel.
    pub fn begin_batch(&mut self) {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        self.events_tx = events_tx;
        self.events_rx = events_rx;
        self.counter = 0;
        self.spawn_failed = false;
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let id = self.workers.len();
        let spawned = self.spawner.spawn(id)?;
        let events = self.events_tx.clone();
        let responses = spawned.responses;
        let reader = spawn_reader_thread(format!("parmin-worker-{}", id), move || {
            read_responses(id, responses, events)
        });
        let mut link = spawned.link;
        let reader = match reader {
            Ok(reader) => reader,
            Err(e) => {
                let _ = link.kill();
                return Err(e);
            }
        };

        debug!(worker_id = id, label = %link.label(), "Worker joined pool");
        self.workers.push(PoolWorker {
            link,
            reader: Some(reader),
            in_flight: VecDeque::new(),
            faulted: false,
            jobs: 0,
        });
        Ok(())
    }

    /// Pick the worker for the next job.
    ///
    /// Grows the pool by one while it is below its bound, then returns
    /// `counter mod size` against the size at this moment and advances the
    /// counter.
    pub fn next_worker(&mut self) -> Result<usize> {
        if self.workers.len() < self.max
            && !self.spawn_failed
            && let Err(e) = self.spawn_worker()
        {
            self.spawn_failed = true;
            warn!(pool_size = self.workers.len(), error = %e, "Failed to grow worker pool");
            return Err(e);
        }
        if self.workers.is_empty() {
            return Err(ParminError::Worker("no workers available".into()));
        }
        let index = self.counter % self.workers.len();
        self.counter = self.counter.wrapping_add(1);
        Ok(index)
    }

    /// Send `job` to worker `index`, recording it as in flight.
    pub fn send(&mut self, index: usize, job: Job) -> Result<()> {
        let worker = self.worker_mut(index)?;
        let file = job.file.clone();
        worker.link.send(&WorkRequest::Job(job))?;
        trace!(worker_id = index, file = %file, queued = worker.in_flight.len(), "Job sent");
        worker.in_flight.push_back(file);
        worker.jobs += 1;
        Ok(())
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PoolEvent> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Record that worker `index` answered for `file`.
    pub fn complete(&mut self, index: usize, file: &str) {
        let Some(worker) = self.workers.get_mut(index) else {
            return;
        };
        match worker.in_flight.front() {
            Some(front) if front == file => {
                worker.in_flight.pop_front();
            }
            _ => {
                warn!(worker_id = index, file, "Response out of send order");
                if let Some(pos) = worker.in_flight.iter().position(|f| f == file) {
                    worker.in_flight.remove(pos);
                }
            }
        }
    }

    /// Files still owed by worker `index`; the worker owes nothing after this.
    pub fn take_in_flight(&mut self, index: usize) -> Vec<String> {
        self.workers
            .get_mut(index)
            .map(|w| w.in_flight.drain(..).collect())
            .unwrap_or_default()
    }

    /// Mark worker `index` as faulted. Returns `true` the first time only.
    pub fn mark_faulted(&mut self, index: usize) -> bool {
        match self.workers.get_mut(index) {
            Some(worker) if !worker.faulted => {
                worker.faulted = true;
                true
            }
            _ => false,
        }
    }

    pub fn kill(&mut self, index: usize) {
        if let Some(worker) = self.workers.get_mut(index)
            && let Err(e) = worker.link.kill()
        {
            warn!(worker_id = index, error = %e, "Failed to kill worker");
        }
    }

    pub fn termination(&mut self, index: usize) -> TerminationReason {
        match self.workers.get_mut(index) {
            Some(worker) => worker.link.termination(REAP_TIMEOUT),
            None => TerminationReason::Unknown,
        }
    }

    pub fn label(&self, index: usize) -> String {
        self.workers
            .get(index)
            .map(|w| w.link.label())
            .unwrap_or_else(|| format!("worker {}", index))
    }

    fn worker_mut(&mut self, index: usize) -> Result<&mut PoolWorker> {
        self.workers
            .get_mut(index)
            .ok_or_else(|| ParminError::Worker(format!("worker {} is not in the pool", index)))
    }

    /// Stop every worker and empty the pool. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        for (id, mut worker) in self.workers.drain(..).enumerate() {
            if let Err(e) = worker.link.stop(STOP_TIMEOUT) {
                warn!(worker_id = id, error = %e, "Failed to stop worker");
            }
            if let Some(reader) = worker.reader.take()
                && reader.join().is_err()
            {
                warn!(worker_id = id, "Reader thread panicked");
            }
            debug!(worker_id = id, jobs = worker.jobs, "Worker stopped");
        }
    }
}

impl<S> Drop for WorkerPool<S> {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            let _ = worker.link.stop(STOP_TIMEOUT);
        }
    }
}
