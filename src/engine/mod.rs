//! The JavaScript transform engine used by workers.
//!
//! Workers only see the [`TransformEngine`] trait. Warnings are handed to an
//! explicit [`WarningSink`] owned by the caller for the duration of one
//! job, so nothing about a job outlives it.
//!
//! [`OxcEngine`] parses with `oxc_parser`, reports what compression will
//! drop, shortens property names if asked, then runs `oxc_minifier` and
//! prints with `oxc_codegen`.

pub mod emit;
pub mod lines;
pub mod parse;
pub mod props;
pub mod report;

use crate::config::TransformOptions;
use lines::LineIndex;
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_minifier::{
    CompressOptions as OxcCompressOptions, MangleOptions as OxcMangleOptions, Minifier,
    MinifierOptions,
};
use sourcemap::SourceMap;
use thiserror::Error;

/// Receives the engine's warnings while a single job runs.
///
/// Each warning carries a `[file:line,col]` marker naming its generated
/// position (1-based line, 0-based column) in the job's input.
pub trait WarningSink {
    fn warn(&mut self, text: String);
}

impl WarningSink for Vec<String> {
    fn warn(&mut self, text: String) {
        self.push(text);
    }
}

/// Errors raised by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The input could not be read at a known position.
    #[error("{message} (line {line}, col {col})")]
    Parse { message: String, line: u32, col: u32 },

    #[error("{0}")]
    Message(String),
}

/// One unit of input for the engine.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    /// Name of the asset; used in warning markers and as the map's source.
    pub file: &'a str,
    pub code: &'a str,
    pub options: &'a TransformOptions,
}

/// Minified code plus the map from it back to the request's code.
#[derive(Debug)]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// Anything that can minify one asset.
pub trait TransformEngine: Send + Sync {
    fn minify(
        &self,
        request: &TransformRequest<'_>,
        sink: &mut dyn WarningSink,
    ) -> Result<TransformOutput, EngineError>;
}

/// Format a warning with its generated-position marker.
pub fn marked(message: &str, file: &str, line: u32, col: u32) -> String {
    format!("{} [{}:{},{}]", message, file, line, col)
}

/// Minifier built on the oxc toolchain.
#[derive(Debug, Default, Clone, Copy)]
pub struct OxcEngine;

impl TransformEngine for OxcEngine {
    fn minify(
        &self,
        request: &TransformRequest<'_>,
        sink: &mut dyn WarningSink,
    ) -> Result<TransformOutput, EngineError> {
        let options = request.options;
        let print = options.print_options();
        let compress = options.compress.settings();
        let mangle = options.mangle.settings();

        let lines = LineIndex::new(request.code);
        let allocator = Allocator::default();
        let mut program = parse::parse(&allocator, request.code, request.file, &lines)?;

        if let Some(compress) = compress.as_ref().filter(|c| c.warnings) {
            report::report_drops(&program, compress, request.file, &lines, sink);
        }
        let comments = emit::kept_comments(&program, request.code, &print.comments);
        if let Some(props) = mangle.as_ref().and_then(|m| m.props.as_ref()) {
            props::mangle_properties(&allocator, &mut program, props);
        }

        let minifier = Minifier::new(MinifierOptions {
            compress: compress.map(|c| OxcCompressOptions {
                drop_debugger: c.drop_debugger,
                drop_console: c.drop_console,
                ..OxcCompressOptions::default()
            }),
            mangle: mangle.map(|m| OxcMangleOptions {
                top_level: m.toplevel,
                ..OxcMangleOptions::default()
            }),
            ..MinifierOptions::default()
        });
        let minified = minifier.build(&allocator, &mut program);

        let printed = Codegen::new()
            .with_options(emit::codegen_options(
                &print,
                request.file,
                options.source_map,
            ))
            .with_scoping(minified.scoping)
            .build(&program);

        let header = emit::header(print.preamble.as_deref(), &comments);
        emit::finish(
            printed.code,
            printed.map.map(|map| map.to_json_string()),
            &header,
        )
    }
}
