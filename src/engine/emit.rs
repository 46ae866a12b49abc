//! Printing: codegen settings, the comment header, and the output map.

use super::{EngineError, TransformOutput};
use crate::config::{CommentPolicy, PrintOptions};
use crate::mapping;
use oxc_ast::ast::Program;
use oxc_codegen::CodegenOptions;
use sourcemap::SourceMap;
use std::path::PathBuf;

/// Codegen settings for one job.
///
/// Comments are never printed inline; the ones the policy keeps are hoisted
/// into the header instead.
pub fn codegen_options(print: &PrintOptions, file: &str, source_map: bool) -> CodegenOptions {
    CodegenOptions {
        minify: !print.beautify,
        source_map_path: source_map.then(|| PathBuf::from(file)),
        ..CodegenOptions::minify()
    }
}

fn comment_body(text: &str) -> &str {
    if let Some(line) = text.strip_prefix("//") {
        return line;
    }
    text.strip_prefix("/*")
        .and_then(|block| block.strip_suffix("*/"))
        .unwrap_or(text)
}

/// Comments of `program` that `policy` keeps, in source order.
pub fn kept_comments(program: &Program<'_>, source: &str, policy: &CommentPolicy) -> Vec<String> {
    program
        .comments
        .iter()
        .filter_map(|comment| source.get(comment.span.start as usize..comment.span.end as usize))
        .filter(|text| policy.keeps(comment_body(text)))
        .map(str::to_string)
        .collect()
}

/// Lines printed above the code: the preamble, then kept comments.
pub fn header(preamble: Option<&str>, comments: &[String]) -> String {
    let mut header = String::new();
    for part in preamble.into_iter().chain(comments.iter().map(String::as_str)) {
        header.push_str(part);
        if !part.ends_with('\n') {
            header.push('\n');
        }
    }
    header
}

/// Prefix `code` with `header` and move the map down by the header's lines.
pub fn finish(
    code: String,
    map_json: Option<String>,
    header: &str,
) -> Result<TransformOutput, EngineError> {
    let map = map_json
        .map(|json| SourceMap::from_slice(json.as_bytes()))
        .transpose()
        .map_err(|e| EngineError::Message(format!("Invalid output source map: {}", e)))?;

    let shift = header.matches('\n').count() as u32;
    let map = match map {
        Some(map) if shift > 0 => Some(mapping::shift_lines(&map, shift)),
        map => map,
    };

    let code = if header.is_empty() {
        code
    } else {
        format!("{}{}", header, code)
    };
    Ok(TransformOutput { code, map })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::tests::single_mapping;

    #[test]
    fn test_comment_body() {
        assert_eq!(comment_body("/*! banner */"), "! banner ");
        assert_eq!(comment_body("// @license MIT"), " @license MIT");
        assert_eq!(comment_body("bare"), "bare");
    }

    #[test]
    fn test_header_lines() {
        let comments = vec!["/*! a */".to_string(), "// @license b".to_string()];
        assert_eq!(
            header(Some("'use strict';"), &comments),
            "'use strict';\n/*! a */\n// @license b\n"
        );
        assert_eq!(header(None, &[]), "");
    }

    #[test]
    fn test_finish_shifts_map() {
        let map = single_mapping("bundle.js", 1, "bundle.js", 1, 0);
        let out = finish("x;".into(), Some(map), "/*! a */\n").unwrap();
        assert_eq!(out.code, "/*! a */\nx;");
        let map = out.map.unwrap();
        let token = map.get_token(0).unwrap();
        assert_eq!((token.get_dst_line(), token.get_src_line()), (1, 0));
    }

    #[test]
    fn test_finish_rejects_broken_map() {
        assert!(finish("x;".into(), Some("{".into()), "").is_err());
    }
}
