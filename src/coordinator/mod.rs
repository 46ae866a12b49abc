//! Parallel dispatch of minification jobs.
//!
//! The [`Coordinator`] is driven from a single thread. A batch starts with
//! [`Coordinator::optimize_chunk_assets`], which sends every job straight
//! away; the host then feeds pool events back in with [`Coordinator::poll`]
//! or [`Coordinator::wait`]. The completion callback runs exactly once per
//! batch, when the last outstanding job is answered, or immediately when the
//! batch has nothing to send.

pub mod pool;

use crate::config::MinifyOptions;
use crate::error::{ParminError, Result};
use crate::host::{Asset, AssetKey, BuildDiagnostic, Compilation, RequestShortener};
use crate::mapping;
use crate::matcher::AssetMatcher;
use crate::worker::{Job, JobError, JobWarning, Response, WorkerFailure, WorkerSpawner};
use pool::{PoolEvent, WorkerPool};
use sourcemap::SourceMap;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Called once when a batch is finished.
pub type Completion = Box<dyn FnOnce(&mut Compilation)>;

/// Counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub dispatched: usize,
    pub cache_hits: usize,
    pub responses: usize,
    pub faults: usize,
}

struct Pending {
    key: AssetKey,
    asset: Asset,
}

struct Batch {
    pending: HashMap<String, Pending>,
    outstanding: usize,
    /// Completion is deferred until every job has been sent.
    dispatching: bool,
    done: Option<Completion>,
    /// A failed pool growth has been reported this batch.
    spawn_reported: bool,
    stats: BatchStats,
}

impl Batch {
    fn new(done: Completion) -> Self {
        Self {
            pending: HashMap::new(),
            outstanding: 0,
            dispatching: true,
            done: Some(done),
            spawn_reported: false,
            stats: BatchStats::default(),
        }
    }
}

/// Owns the worker pool and the transform cache.
pub struct Coordinator<S: WorkerSpawner> {
    options: MinifyOptions,
    matcher: AssetMatcher,
    shortener: RequestShortener,
    pool: WorkerPool<S>,
    /// Transformed replacement per input identity, kept across batches.
    cache: HashMap<AssetKey, Asset>,
    batch: Option<Batch>,
    last_stats: Option<BatchStats>,
}

impl<S: WorkerSpawner> Coordinator<S> {
    pub fn new(options: MinifyOptions, spawner: S, shortener: RequestShortener) -> Self {
        let matcher = options.matcher();
        let pool = WorkerPool::new(spawner, options.workers);
        Self {
            options,
            matcher,
            shortener,
            pool,
            cache: HashMap::new(),
            batch: None,
            last_stats: None,
        }
    }

    pub fn pool(&self) -> &WorkerPool<S> {
        &self.pool
    }

    /// Jobs sent in the current batch and not answered yet.
    pub fn outstanding(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.outstanding)
    }

    pub fn is_running(&self) -> bool {
        self.batch.is_some()
    }

    pub fn cached_assets(&self) -> usize {
        self.cache.len()
    }

    /// Counters of the most recently completed batch.
    pub fn last_stats(&self) -> Option<BatchStats> {
        self.last_stats
    }

    /// Start a batch over the compilation's chunk files.
    ///
    /// Matching assets with a cached replacement are swapped in on the spot;
    /// every other match becomes one job. When no job is sent, `done` runs
    /// before this returns.
    pub fn optimize_chunk_assets(
        &mut self,
        compilation: &mut Compilation,
        done: Completion,
    ) -> Result<()> {
        if let Some(batch) = &self.batch {
            return Err(ParminError::BatchInProgress {
                outstanding: batch.outstanding,
            });
        }

        let mut seen = HashSet::new();
        let files: Vec<String> = compilation
            .candidate_files()
            .into_iter()
            .filter(|file| self.matcher.is_match(file) && seen.insert(file.clone()))
            .collect();
        if let Some(missing) = files.iter().find(|f| !compilation.assets.contains_key(*f)) {
            return Err(ParminError::AssetNotFound(missing.clone()));
        }

        self.pool.begin_batch();
        self.batch = Some(Batch::new(done));

        for file in files {
            let Some(asset) = compilation.assets.get(&file).cloned() else {
                continue;
            };
            let key = AssetKey::of(&file, &asset);
            if let Some(cached) = self.cache.get(&key) {
                debug!(file = %file, key = %key, "Using cached result");
                compilation.assets.insert(file, cached.clone());
                if let Some(batch) = self.batch.as_mut() {
                    batch.stats.cache_hits += 1;
                }
                continue;
            }

            let job = Job {
                file: file.clone(),
                input: asset.source.clone(),
                input_source_map: if self.options.source_map() {
                    asset.map.clone()
                } else {
                    None
                },
                options: self.options.transform.clone(),
            };
            if let Some(batch) = self.batch.as_mut() {
                batch.pending.insert(file, Pending { key, asset });
            }
            self.assign_and_send(compilation, job)?;
        }

        if let Some(batch) = self.batch.as_mut() {
            batch.dispatching = false;
            info!(
                jobs = batch.stats.dispatched,
                cache_hits = batch.stats.cache_hits,
                pool_size = self.pool.size(),
                "Batch dispatched"
            );
        }
        if self.batch.is_some() && self.outstanding() == 0 {
            self.complete(compilation);
        }
        Ok(())
    }

    /// Send `job` to the next worker and count it as outstanding.
    ///
    /// A job that cannot be delivered is answered on the spot with an
    /// unstructured failure so the count still settles.
    pub fn assign_and_send(&mut self, compilation: &mut Compilation, job: Job) -> Result<()> {
        let batch = self.batch.as_mut().ok_or_else(|| {
            ParminError::Worker(format!("{} sent outside a batch", job.file))
        })?;
        batch.outstanding += 1;
        batch.stats.dispatched += 1;
        let file = job.file.clone();

        let index = match self.pool.next_worker() {
            Ok(index) => index,
            Err(e) => {
                if let Some(batch) = self.batch.as_mut()
                    && !batch.spawn_reported
                {
                    batch.spawn_reported = true;
                    let failure = WorkerFailure::new("worker pool").with_message(e.to_string());
                    self.on_worker_fault(compilation, &failure);
                }
                let raw_trace = format!("job was not sent: {}", e);
                self.on_response(compilation, Response::failed(file, JobError::Unstructured { raw_trace }));
                return Ok(());
            }
        };

        if let Err(e) = self.pool.send(index, job) {
            let label = self.pool.label(index);
            if self.pool.mark_faulted(index) {
                let failure = WorkerFailure::new(label.as_str())
                    .with_reason(self.pool.termination(index))
                    .with_message(e.to_string());
                self.on_worker_fault(compilation, &failure);
                self.pool.kill(index);
            }
            let raw_trace = format!("{} could not take the job: {}", label, e);
            self.on_response(compilation, Response::failed(file, JobError::Unstructured { raw_trace }));
        }
        Ok(())
    }

    /// Merge one job's response into the compilation.
    pub fn on_response(&mut self, compilation: &mut Compilation, response: Response) {
        let Some(batch) = self.batch.as_mut() else {
            warn!(file = %response.file, "Response arrived outside a batch");
            return;
        };
        let pending = batch.pending.remove(&response.file);
        batch.stats.responses += 1;

        let file = response.file;
        for error in response.errors {
            compilation.errors.push(self.error_diagnostic(&file, error));
        }
        for warning in response.warnings {
            compilation.warnings.push(self.warning_diagnostic(&file, warning));
        }

        if let Some(source) = response.source {
            let input_map = pending.as_ref().and_then(|p| p.asset.map.as_deref());
            let replacement = match self.replacement(source, response.map, input_map) {
                Ok(asset) => asset,
                Err((asset, e)) => {
                    compilation
                        .warnings
                        .push(BuildDiagnostic::new(file.as_str(), format!("Source map not composed: {}", e)));
                    asset
                }
            };
            if let Some(pending) = &pending {
                self.cache.insert(pending.key, replacement.clone());
            }
            compilation.assets.insert(file.clone(), replacement);
        }

        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        match batch.outstanding.checked_sub(1) {
            Some(left) => batch.outstanding = left,
            None => warn!(file = %file, "Response without an outstanding job"),
        }
        debug!(file = %file, outstanding = batch.outstanding, "Response merged");
        if batch.outstanding == 0 && !batch.dispatching {
            self.complete(compilation);
        }
    }

    /// Record a worker-level failure as one batch error.
    ///
    /// The outstanding count is left alone; jobs the worker still owed are
    /// settled separately, one failure response each.
    pub fn on_worker_fault(&mut self, compilation: &mut Compilation, failure: &WorkerFailure) {
        warn!(failure = %failure, "Worker fault");
        compilation
            .errors
            .push(BuildDiagnostic::new("", format!("parmin: {}", failure)));
        if let Some(batch) = self.batch.as_mut() {
            batch.stats.faults += 1;
        }
    }

    /// Stop every worker. Safe to call at any time.
    pub fn disconnect(&mut self) {
        self.pool.disconnect();
    }

    /// Handle at most one pool event, waiting up to `timeout`.
    ///
    /// Returns `true` while the batch is still running.
    pub fn poll(&mut self, compilation: &mut Compilation, timeout: Duration) -> bool {
        if self.batch.is_none() {
            return false;
        }
        match self.pool.recv_timeout(timeout) {
            Some(PoolEvent::Response { worker, response }) => {
                self.pool.complete(worker, &response.file);
                self.on_response(compilation, response);
            }
            Some(PoolEvent::Fault { worker, message }) => {
                if self.pool.mark_faulted(worker) {
                    let failure = WorkerFailure::new(self.pool.label(worker)).with_message(message);
                    self.on_worker_fault(compilation, &failure);
                }
                // its reader reports the exit, which settles what it owed
                self.pool.kill(worker);
            }
            Some(PoolEvent::Exited { worker }) => self.on_worker_exit(compilation, worker),
            None => {}
        }
        self.batch.is_some()
    }

    /// Handle events until the current batch completes.
    pub fn wait(&mut self, compilation: &mut Compilation) {
        while self.poll(compilation, Duration::from_millis(250)) {}
    }

    fn on_worker_exit(&mut self, compilation: &mut Compilation, worker: usize) {
        let orphans = self.pool.take_in_flight(worker);
        if orphans.is_empty() {
            debug!(worker_id = worker, "Worker exited");
            return;
        }

        let label = self.pool.label(worker);
        if self.pool.mark_faulted(worker) {
            let failure = WorkerFailure::new(label.as_str())
                .with_reason(self.pool.termination(worker))
                .with_in_flight(orphans.clone());
            self.on_worker_fault(compilation, &failure);
        }
        for file in orphans {
            let raw_trace = format!("{} exited before replying", label);
            self.on_response(compilation, Response::failed(file, JobError::Unstructured { raw_trace }));
        }
    }

    fn complete(&mut self, compilation: &mut Compilation) {
        self.pool.disconnect();
        let Some(mut batch) = self.batch.take() else {
            return;
        };
        info!(
            jobs = batch.stats.dispatched,
            cache_hits = batch.stats.cache_hits,
            responses = batch.stats.responses,
            faults = batch.stats.faults,
            errors = compilation.errors.len(),
            warnings = compilation.warnings.len(),
            "Batch complete"
        );
        self.last_stats = Some(batch.stats);
        if let Some(done) = batch.done.take() {
            done(compilation);
        }
    }

    /// Build the asset that replaces a successfully minified input.
    ///
    /// On a composition failure the output map alone is kept and the error
    /// is returned alongside.
    fn replacement(
        &self,
        source: String,
        output_map: Option<String>,
        input_map: Option<&str>,
    ) -> std::result::Result<Asset, (Asset, ParminError)> {
        if !self.options.source_map() {
            return Ok(Asset::raw(source));
        }
        let Some(output_map) = output_map else {
            return Ok(Asset::raw(source));
        };
        let Some(input_map) = input_map else {
            return Ok(Asset::with_map(source, output_map));
        };

        let composed = SourceMap::from_slice(output_map.as_bytes())
            .and_then(|output| {
                SourceMap::from_slice(input_map.as_bytes())
                    .map(|input| mapping::compose(&output, &input))
            })
            .map_err(ParminError::from)
            .and_then(|map| mapping::to_json(&map));
        match composed {
            Ok(map) => Ok(Asset::with_map(source, map)),
            Err(e) => Err((Asset::with_map(source, output_map), e)),
        }
    }

    fn error_diagnostic(&self, file: &str, error: JobError) -> BuildDiagnostic {
        match error {
            JobError::Positional {
                message,
                line,
                column,
            } => BuildDiagnostic::new(file, message).with_origin(file, line, column),
            JobError::Resolved {
                message,
                original_file,
                line,
                column,
            } => BuildDiagnostic::new(file, message).with_origin(
                self.shortener.shorten(&original_file),
                line,
                column,
            ),
            JobError::Message { message } => BuildDiagnostic::new(file, message),
            JobError::Unstructured { raw_trace } => BuildDiagnostic::new(file, raw_trace),
        }
    }

    fn warning_diagnostic(&self, file: &str, warning: JobWarning) -> BuildDiagnostic {
        match warning {
            JobWarning::Resolved {
                message,
                original_file,
                line,
                column,
            } => BuildDiagnostic::new(file, message.trim_end()).with_origin(
                self.shortener.shorten(&original_file),
                line,
                column,
            ),
            JobWarning::Raw { text } => BuildDiagnostic::new(file, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Origin;
    use crate::mapping::PositionResolver;
    use crate::mapping::tests::single_mapping;
    use crate::worker::thread::ThreadSpawner;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn options(workers: usize) -> MinifyOptions {
        MinifyOptions {
            workers,
            ..Default::default()
        }
    }

    fn coordinator(options: MinifyOptions, spawner: ThreadSpawner) -> Coordinator<ThreadSpawner> {
        Coordinator::new(options, spawner, RequestShortener::new("/project"))
    }

    fn completion() -> (Rc<Cell<usize>>, Completion) {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        (calls, Box::new(move |_: &mut Compilation| seen.set(seen.get() + 1)))
    }

    fn compilation(files: &[(&str, Asset)]) -> Compilation {
        let mut compilation = Compilation::new();
        for (file, asset) in files {
            compilation.emit("main", *file, asset.clone());
        }
        compilation
    }

    fn scripts(count: usize) -> Compilation {
        let files: Vec<(String, Asset)> = (0..count)
            .map(|i| {
                let source = format!("function f{i}(value) {{ return value + {i}; }}");
                (format!("chunk{}.js", i), Asset::raw(source))
            })
            .collect();
        let refs: Vec<(&str, Asset)> = files.iter().map(|(f, a)| (f.as_str(), a.clone())).collect();
        compilation(&refs)
    }

    #[test]
    fn test_every_job_answered_and_completion_fires_once() {
        let mut coordinator = coordinator(options(3), ThreadSpawner::new());
        let mut compilation = scripts(7);
        let (calls, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        assert_eq!(calls.get(), 0);
        assert!(coordinator.is_running());

        coordinator.wait(&mut compilation);
        assert_eq!(calls.get(), 1);
        assert_eq!(coordinator.outstanding(), 0);
        assert!(!coordinator.is_running());

        let stats = coordinator.last_stats().unwrap();
        assert_eq!(stats.dispatched, 7);
        assert_eq!(stats.responses, 7);
        assert_eq!(stats.faults, 0);
        assert!(compilation.errors.is_empty());
        for asset in compilation.assets.values() {
            assert!(!asset.source.contains("value"));
        }

        // pool is torn down at the end of the batch
        assert_eq!(coordinator.pool().size(), 0);
        assert!(!coordinator.poll(&mut compilation, Duration::from_millis(1)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_round_robin_against_growing_pool() {
        let spawner = ThreadSpawner::new();
        let log = Arc::clone(&spawner.log);
        let mut coordinator = coordinator(options(3), spawner);
        let mut compilation = scripts(7);
        let (_, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);

        assert_eq!(
            ThreadSpawner::files_of(&log, 0),
            vec!["chunk0.js", "chunk3.js", "chunk6.js"]
        );
        assert_eq!(ThreadSpawner::files_of(&log, 1), vec!["chunk1.js", "chunk4.js"]);
        assert_eq!(ThreadSpawner::files_of(&log, 2), vec!["chunk2.js", "chunk5.js"]);
    }

    #[test]
    fn test_pool_never_exceeds_bound() {
        let mut coordinator = coordinator(options(2), ThreadSpawner::new());
        let mut compilation = scripts(5);
        let (_, done) = completion();
        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        assert_eq!(coordinator.pool().size(), 2);
        assert_eq!(coordinator.pool().spawner().spawned, vec![0, 1]);
        coordinator.wait(&mut compilation);
    }

    #[test]
    fn test_empty_batch_completes_synchronously() {
        let mut coordinator = coordinator(options(4), ThreadSpawner::new());
        let mut compilation = compilation(&[("style.css", Asset::raw("a{}"))]);
        let (calls, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(!coordinator.is_running());
        assert!(coordinator.pool().spawner().spawned.is_empty());
        assert_eq!(compilation.assets["style.css"], Asset::raw("a{}"));
    }

    #[test]
    fn test_warning_resolved_to_original_location() {
        let map = single_mapping("bundle.js", 2, "/project/src/a.js", 10, 4);
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut compilation =
            compilation(&[("bundle.js", Asset::with_map("a();\n  debugger;\nb();\n", map))]);
        let (_, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);

        assert_eq!(
            compilation.warnings,
            vec![BuildDiagnostic {
                file: "bundle.js".into(),
                message: "Dropping debugger statement".into(),
                origin: Some(Origin {
                    source: "./src/a.js".into(),
                    line: 10,
                    column: 4,
                }),
            }]
        );
    }

    #[test]
    fn test_self_referential_warning_dropped() {
        let map = single_mapping("bundle.js", 2, "bundle.js", 2, 2);
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut compilation =
            compilation(&[("bundle.js", Asset::with_map("a();\n  debugger;\n", map))]);
        let (_, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);
        assert!(compilation.warnings.is_empty());
        assert!(compilation.errors.is_empty());
    }

    #[test]
    fn test_source_maps_disabled() {
        let mut options = options(1);
        options.transform.source_map = false;
        let map = single_mapping("bundle.js", 2, "src/a.js", 10, 4);
        let mut coordinator = coordinator(options, ThreadSpawner::new());
        let mut compilation =
            compilation(&[("bundle.js", Asset::with_map("a();\n  debugger;\n", map))]);
        let (_, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);

        assert_eq!(
            compilation.warnings,
            vec![BuildDiagnostic::new(
                "bundle.js",
                "Dropping debugger statement [bundle.js:2,2]"
            )]
        );
        let asset = &compilation.assets["bundle.js"];
        assert!(asset.map.is_none());
        assert!(!asset.source.contains("debugger"));
    }

    #[test]
    fn test_output_map_composed_with_input_map() {
        let map = single_mapping("bundle.js", 1, "/project/src/main.js", 5, 0);
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut compilation = compilation(&[("bundle.js", Asset::with_map("var total = 1;", map))]);
        let (_, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);

        let asset = &compilation.assets["bundle.js"];
        let resolver = PositionResolver::from_json(asset.map.as_deref().unwrap()).unwrap();
        let first = resolver.map().get_token(0).unwrap();
        let original = resolver
            .resolve(first.get_dst_line() + 1, first.get_dst_col())
            .unwrap();
        assert_eq!(original.source, "/project/src/main.js");
        assert_eq!(original.line, 5);
    }

    #[test]
    fn test_unchanged_asset_is_served_from_cache() {
        let spawner = ThreadSpawner::new();
        let log = Arc::clone(&spawner.log);
        let mut coordinator = coordinator(options(2), spawner);

        let mut first = scripts(1);
        let (_, done) = completion();
        coordinator.optimize_chunk_assets(&mut first, done).unwrap();
        coordinator.wait(&mut first);
        assert_eq!(coordinator.cached_assets(), 1);

        let mut second = scripts(1);
        let (calls, done) = completion();
        coordinator.optimize_chunk_assets(&mut second, done).unwrap();
        assert_eq!(calls.get(), 1);

        let stats = coordinator.last_stats().unwrap();
        assert_eq!(stats.dispatched, 0);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(second.assets["chunk0.js"], first.assets["chunk0.js"]);
    }

    #[test]
    fn test_changed_asset_is_sent_again() {
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut first = compilation(&[("app.js", Asset::raw("var a = 1;"))]);
        let (_, done) = completion();
        coordinator.optimize_chunk_assets(&mut first, done).unwrap();
        coordinator.wait(&mut first);

        let mut second = compilation(&[("app.js", Asset::raw("var a = 2;"))]);
        let (_, done) = completion();
        coordinator.optimize_chunk_assets(&mut second, done).unwrap();
        coordinator.wait(&mut second);
        assert_eq!(coordinator.last_stats().unwrap().dispatched, 1);
        assert_eq!(coordinator.cached_assets(), 2);
    }

    #[test]
    fn test_warnings_stay_with_their_job() {
        let mut options = options(1);
        options.transform.source_map = false;
        let mut coordinator = coordinator(options, ThreadSpawner::new());
        let mut compilation = compilation(&[
            ("noisy.js", Asset::raw("debugger;\ndebugger;\ndebugger;\n")),
            ("quiet.js", Asset::raw("var quiet = 1;\n")),
        ]);
        let (_, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);
        assert_eq!(compilation.warnings.len(), 3);
        assert!(compilation.warnings.iter().all(|w| w.file == "noisy.js"));
    }

    #[test]
    fn test_parse_error_reported_with_position() {
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut compilation = compilation(&[("broken.js", Asset::raw("var s = 'open;\n"))]);
        let (calls, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);
        assert_eq!(calls.get(), 1);
        assert_eq!(compilation.errors.len(), 1);
        let error = &compilation.errors[0];
        assert_eq!(error.file, "broken.js");
        assert!(error.message.contains("Unterminated string"));
        assert_eq!(
            error.origin,
            Some(Origin {
                source: "broken.js".into(),
                line: 1,
                column: 8
            })
        );
        // failed assets are left untouched
        assert_eq!(compilation.assets["broken.js"], Asset::raw("var s = 'open;\n"));
        assert_eq!(coordinator.cached_assets(), 0);
    }

    #[test]
    fn test_regex_literals_after_control_parens_minify_cleanly() {
        let mut coordinator = coordinator(options(2), ThreadSpawner::new());
        let mut compilation = compilation(&[
            ("guard.js", Asset::raw("if (ok) /a+/.test(s) && go();\n")),
            (
                "loop.js",
                Asset::raw(
                    "function f(s, x) {\n  var n = 0;\n  while (n++ < 1) /x/.test(s) && (x = 1);\n  return x;\n}\n",
                ),
            ),
        ]);
        let (calls, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);
        assert_eq!(calls.get(), 1);
        assert!(compilation.errors.is_empty(), "{:?}", compilation.errors);
        assert!(compilation.assets["guard.js"].source.contains("/a+/.test(s)"));
        assert!(compilation.assets["loop.js"].source.contains("/x/.test("));
    }

    #[test]
    fn test_worker_fault_does_not_settle_jobs() {
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut compilation = scripts(2);
        let (calls, done) = completion();
        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        let outstanding = coordinator.outstanding();

        let failure = WorkerFailure::new("worker 0").with_message("lost contact");
        coordinator.on_worker_fault(&mut compilation, &failure);
        assert_eq!(compilation.errors.len(), 1);
        assert_eq!(compilation.errors[0].message, "parmin: worker 0: lost contact");
        assert_eq!(coordinator.outstanding(), outstanding);
        assert_eq!(calls.get(), 0);

        coordinator.wait(&mut compilation);
        assert_eq!(calls.get(), 1);
        assert_eq!(coordinator.last_stats().unwrap().faults, 1);
    }

    #[test]
    fn test_vanished_worker_settles_its_jobs() {
        let mut coordinator = coordinator(options(2), ThreadSpawner::new().vanishing(0));
        let mut compilation = scripts(4);
        let (calls, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        coordinator.wait(&mut compilation);
        assert_eq!(calls.get(), 1);

        let stats = coordinator.last_stats().unwrap();
        assert_eq!(stats.responses, 4);
        assert_eq!(stats.faults, 1);

        // one fault diagnostic plus one failure per job worker 0 owed
        let faults: Vec<_> = compilation.errors.iter().filter(|e| e.file.is_empty()).collect();
        assert_eq!(faults.len(), 1);
        let mut failed: Vec<_> = compilation
            .errors
            .iter()
            .filter(|e| !e.file.is_empty())
            .map(|e| e.file.as_str())
            .collect();
        failed.sort();
        assert_eq!(failed, vec!["chunk0.js", "chunk2.js"]);

        // worker 1's jobs went through
        assert!(!compilation.assets["chunk1.js"].source.contains("value"));
        assert!(!compilation.assets["chunk3.js"].source.contains("value"));
    }

    #[test]
    fn test_spawn_failure_still_completes() {
        let mut coordinator = coordinator(options(2), ThreadSpawner::new().broken(0));
        let mut compilation = scripts(3);
        let (calls, done) = completion();

        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(compilation.errors.iter().filter(|e| e.file.is_empty()).count(), 1);
        assert_eq!(compilation.errors.len(), 4);
    }

    #[test]
    fn test_second_batch_rejected_while_running() {
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut compilation = scripts(2);
        let (_, done) = completion();
        coordinator.optimize_chunk_assets(&mut compilation, done).unwrap();

        let (calls, done) = completion();
        let err = coordinator
            .optimize_chunk_assets(&mut compilation, done)
            .unwrap_err();
        assert!(matches!(err, ParminError::BatchInProgress { .. }));
        assert_eq!(calls.get(), 0);
        coordinator.wait(&mut compilation);
    }

    #[test]
    fn test_missing_asset_is_an_error() {
        let mut coordinator = coordinator(options(1), ThreadSpawner::new());
        let mut compilation = Compilation::new();
        compilation.additional_chunk_assets.push("ghost.js".into());
        let (calls, done) = completion();

        let err = coordinator
            .optimize_chunk_assets(&mut compilation, done)
            .unwrap_err();
        assert!(matches!(err, ParminError::AssetNotFound(file) if file == "ghost.js"));
        assert_eq!(calls.get(), 0);
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut coordinator = coordinator(options(2), ThreadSpawner::new());
        coordinator.disconnect();
        coordinator.disconnect();
        assert_eq!(coordinator.pool().size(), 0);
    }
}
