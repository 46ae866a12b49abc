//! Parsing job input with `oxc_parser`.

use super::EngineError;
use super::lines::LineIndex;
use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;
use oxc_span::SourceType;

/// `.mjs` assets parse as ES modules, everything else as a classic script.
pub fn source_type(file: &str) -> SourceType {
    let path = file.split(['?', '#']).next().unwrap_or(file);
    if path.ends_with(".mjs") {
        SourceType::mjs()
    } else {
        SourceType::cjs()
    }
}

/// Parse `source` into a program allocated in `allocator`.
///
/// When the parser reports errors, the earliest one in the input becomes an
/// [`EngineError::Parse`] at its line and column.
pub fn parse<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    file: &str,
    lines: &LineIndex<'_>,
) -> Result<Program<'a>, EngineError> {
    let result = Parser::new(allocator, source, source_type(file)).parse();
    if result.errors.is_empty() && !result.panicked {
        return Ok(result.program);
    }

    let earliest = result
        .errors
        .iter()
        .map(|error| {
            let offset = error
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| label.offset());
            (offset, error)
        })
        .min_by_key(|(offset, _)| offset.unwrap_or(usize::MAX));

    Err(match earliest {
        Some((Some(offset), error)) => {
            let (line, col) = lines.position(offset as u32);
            EngineError::Parse {
                message: error.to_string(),
                line,
                col,
            }
        }
        Some((None, error)) => EngineError::Message(error.to_string()),
        None => EngineError::Message(format!("{} could not be parsed", file)),
    })
}
