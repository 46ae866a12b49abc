//! Running a single job.
//!
//! Warnings go to a [`JobSink`] created for the job and dropped with it, so
//! nothing one job reports can show up in the next job's response.

use super::protocol::{Job, JobError, JobWarning, Response};
use crate::engine::{EngineError, TransformEngine, TransformRequest, WarningSink};
use crate::mapping::{self, PositionResolver, parse_marker, strip_marker};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace};

/// Collects one job's warnings.
///
/// With a resolver, warnings are translated to original positions and
/// anything unresolvable or pointing back at the job's own file is dropped.
/// Without one, warning text is kept verbatim.
pub struct JobSink<'a> {
    file: &'a str,
    resolver: Option<&'a PositionResolver>,
    warnings: Vec<JobWarning>,
}

impl<'a> JobSink<'a> {
    pub fn new(file: &'a str, resolver: Option<&'a PositionResolver>) -> Self {
        Self {
            file,
            resolver,
            warnings: Vec::new(),
        }
    }

    pub fn into_warnings(self) -> Vec<JobWarning> {
        self.warnings
    }

    fn resolve(&self, resolver: &PositionResolver, text: &str) -> Option<JobWarning> {
        let (line, column) = parse_marker(text)?;
        let original = resolver.resolve(line, column)?;
        if original.source == self.file {
            return None;
        }
        Some(JobWarning::Resolved {
            message: strip_marker(text),
            original_file: original.source,
            line: original.line,
            column: original.column,
        })
    }
}

impl WarningSink for JobSink<'_> {
    fn warn(&mut self, text: String) {
        let Some(resolver) = self.resolver else {
            self.warnings.push(JobWarning::Raw { text });
            return;
        };
        match self.resolve(resolver, &text) {
            Some(warning) => self.warnings.push(warning),
            None => trace!(file = self.file, warning = %text, "Dropping unresolved warning"),
        }
    }
}

fn classify(error: EngineError, resolver: Option<&PositionResolver>) -> JobError {
    match error {
        EngineError::Parse { message, line, col } => {
            match resolver.and_then(|r| r.resolve(line, col)) {
                Some(original) => JobError::Resolved {
                    message,
                    original_file: original.source,
                    line: original.line,
                    column: original.column,
                },
                None => JobError::Positional {
                    message,
                    line,
                    column: col,
                },
            }
        }
        EngineError::Message(message) => JobError::Message { message },
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "transform engine panicked".to_string()
    }
}

/// Run `job` through `engine` and build its one response.
///
/// Never fails: every failure, including an engine panic, is reported in
/// the response's `errors`.
pub fn run_job(engine: &dyn TransformEngine, job: Job) -> Response {
    let Job {
        file,
        input,
        input_source_map,
        options,
    } = job;
    let mut response = Response::new(file.as_str());

    let resolver = if options.source_map {
        match input_source_map.as_deref().map(PositionResolver::from_json).transpose() {
            Ok(resolver) => resolver,
            Err(e) => {
                response.errors.push(JobError::Message {
                    message: format!("Invalid input source map: {}", e),
                });
                return echo_input(response, input, input_source_map);
            }
        }
    } else {
        None
    };

    let mut sink = JobSink::new(&file, resolver.as_ref());
    let request = TransformRequest {
        file: &file,
        code: &input,
        options: &options,
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.minify(&request, &mut sink)));
    response.warnings = sink.into_warnings();

    match outcome {
        Ok(Ok(output)) => match output.map.as_ref().map(mapping::to_json).transpose() {
            Ok(map) => {
                response.source = Some(output.code);
                response.map = map;
            }
            Err(e) => response.errors.push(JobError::Message {
                message: format!("Failed to serialize source map: {}", e),
            }),
        },
        Ok(Err(error)) => {
            debug!(file = %file, error = %error, "Transform failed");
            response.errors.push(classify(error, resolver.as_ref()));
        }
        Err(payload) => response.errors.push(JobError::Unstructured {
            raw_trace: panic_text(payload.as_ref()),
        }),
    }

    if response.errors.is_empty() {
        response
    } else {
        echo_input(response, input, input_source_map)
    }
}

fn echo_input(mut response: Response, input: String, input_source_map: Option<String>) -> Response {
    response.source = None;
    response.map = None;
    response.input = input;
    response.input_source_map = input_source_map.unwrap_or_default();
    response
}
