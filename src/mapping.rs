//! Source-map plumbing shared by the worker and the coordinator.
//!
//! Positions follow the engine's convention: lines are 1-based, columns are
//! 0-based. The `sourcemap` crate is 0-based for both, so conversions happen
//! only inside this module.

use crate::error::Result;
use regex::Regex;
use sourcemap::{SourceMap, SourceMapBuilder};
use std::sync::LazyLock;

/// Generated-position marker embedded in engine warnings: `[file:line,col]`.
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.+:([0-9]+),([0-9]+)\]").expect("marker pattern is valid"));

/// A position in an original source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

/// Extract `(line, column)` from a warning's position marker.
pub fn parse_marker(text: &str) -> Option<(u32, u32)> {
    let captures = MARKER.captures(text)?;
    let line = captures.get(1)?.as_str().parse().ok()?;
    let column = captures.get(2)?.as_str().parse().ok()?;
    Some((line, column))
}

/// Remove the position marker from a warning's text.
pub fn strip_marker(text: &str) -> String {
    MARKER.replace(text, "").into_owned()
}

/// Resolves generated positions through a parsed source map.
pub struct PositionResolver {
    map: SourceMap,
}

impl PositionResolver {
    pub fn new(map: SourceMap) -> Self {
        Self { map }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(SourceMap::from_slice(json.as_bytes())?))
    }

    /// Resolve a generated `line` (1-based) and `column` (0-based).
    ///
    /// Only mappings on the same generated line qualify; the closest one at
    /// or before `column` wins.
    pub fn resolve(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        let dst_line = line.checked_sub(1)?;
        let token = self.map.lookup_token(dst_line, column)?;
        if token.get_dst_line() != dst_line {
            return None;
        }
        let source = token.get_source()?;
        Some(OriginalPosition {
            source: source.to_string(),
            line: token.get_src_line() + 1,
            column: token.get_src_col(),
        })
    }

    pub fn map(&self) -> &SourceMap {
        &self.map
    }
}

/// Chain `output` (minified -> input) with `input` (input -> original).
///
/// Output mappings whose input position has no original are dropped.
pub fn compose(output: &SourceMap, input: &SourceMap) -> SourceMap {
    let mut builder = SourceMapBuilder::new(output.get_file());

    for token in output.tokens() {
        let Some(original) = input.lookup_token(token.get_src_line(), token.get_src_col()) else {
            continue;
        };
        if original.get_dst_line() != token.get_src_line() {
            continue;
        }
        let Some(source) = original.get_source() else {
            continue;
        };

        let src_id = builder.add_source(source);
        if let Some(contents) = input.get_source_contents(original.get_src_id()) {
            builder.set_source_contents(src_id, Some(contents));
        }
        let name_id = original
            .get_name()
            .or_else(|| token.get_name())
            .map(|name| builder.add_name(name));

        builder.add_raw(
            token.get_dst_line(),
            token.get_dst_col(),
            original.get_src_line(),
            original.get_src_col(),
            Some(src_id),
            name_id,
            false,
        );
    }

    builder.into_sourcemap()
}

/// Move every mapping of `map` down by `lines` generated lines.
pub fn shift_lines(map: &SourceMap, lines: u32) -> SourceMap {
    let mut builder = SourceMapBuilder::new(map.get_file());

    for token in map.tokens() {
        let src_id = token.get_source().map(|source| {
            let id = builder.add_source(source);
            if let Some(contents) = map.get_source_contents(token.get_src_id()) {
                builder.set_source_contents(id, Some(contents));
            }
            id
        });
        let name_id = token.get_name().map(|name| builder.add_name(name));
        builder.add_raw(
            token.get_dst_line() + lines,
            token.get_dst_col(),
            token.get_src_line(),
            token.get_src_col(),
            src_id,
            name_id,
            false,
        );
    }

    builder.into_sourcemap()
}

/// Serialize a source map to its JSON text.
pub fn to_json(map: &SourceMap) -> Result<String> {
    let mut bytes = Vec::new();
    map.to_writer(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
