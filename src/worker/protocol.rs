//! Messages exchanged between the coordinator and its workers.
//!
//! Each message is one JSON document on one line.

use crate::config::TransformOptions;
use serde::{Deserialize, Serialize};

/// One asset to minify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub file: String,
    pub input: String,
    /// Serialized map from `input` back to its original sources.
    #[serde(default)]
    pub input_source_map: Option<String>,
    pub options: TransformOptions,
}

/// A job failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// Failure at a position in the job's input (1-based line, 0-based column).
    Positional {
        message: String,
        line: u32,
        column: u32,
    },
    /// Positional failure traced back through the input source map.
    Resolved {
        message: String,
        original_file: String,
        line: u32,
        column: u32,
    },
    /// Failure the engine described without a position.
    Message { message: String },
    /// Anything else, reported with whatever text it carried.
    Unstructured { raw_trace: String },
}

/// A warning raised while minifying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobWarning {
    /// Warning located in an original source file.
    Resolved {
        message: String,
        original_file: String,
        line: u32,
        column: u32,
    },
    /// Warning text exactly as the engine produced it.
    Raw { text: String },
}

/// The single reply to a [`Job`].
///
/// `input` and `input_source_map` echo the job only when it failed; they are
/// empty strings on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub file: String,
    pub errors: Vec<JobError>,
    pub warnings: Vec<JobWarning>,
    pub source: Option<String>,
    pub map: Option<String>,
    pub input: String,
    pub input_source_map: String,
}

impl Response {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    /// A failed response carrying a single error.
    pub fn failed(file: impl Into<String>, error: JobError) -> Self {
        Self {
            errors: vec![error],
            ..Self::new(file)
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.source.is_some()
    }
}

/// Request from coordinator to worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkRequest {
    #[serde(rename = "job")]
    Job(Job),

    /// Finish the current job, then exit.
    #[serde(rename = "exit")]
    Exit,
}

/// Message from worker to coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkResponse {
    #[serde(rename = "done")]
    Done(Response),

    /// The worker could not decode a request line.
    #[serde(rename = "invalid")]
    Invalid { message: String },
}

impl WorkRequest {
    pub fn to_line(&self) -> String {
        let mut json = serde_json::to_string(self).expect("WorkRequest serialization failed");
        json.push('\n');
        json
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

impl WorkResponse {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn to_line(&self) -> String {
        let mut json = serde_json::to_string(self).expect("WorkResponse serialization failed");
        json.push('\n');
        json
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}
