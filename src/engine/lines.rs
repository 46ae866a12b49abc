//! Byte offsets to line/column positions.

/// Line starts of one source text.
///
/// Lines are 1-based. Columns are 0-based and counted in UTF-16 code units,
/// the unit source maps use.
#[derive(Debug)]
pub struct LineIndex<'s> {
    source: &'s str,
    starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    pub fn new(source: &'s str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(at, _)| at + 1))
            .collect();
        Self { source, starts }
    }

    /// Position of byte `offset`; offsets past the end clamp to the end.
    pub fn position(&self, offset: u32) -> (u32, u32) {
        let offset = (offset as usize).min(self.source.len());
        let line = self.starts.partition_point(|&start| start <= offset);
        let start = self.starts[line - 1];
        let column = match self.source.get(start..offset) {
            Some(text) => text.encode_utf16().count(),
            None => offset - start,
        };
        (line as u32, column as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions() {
        let index = LineIndex::new("a();\n  debugger;\n");
        assert_eq!(index.position(0), (1, 0));
        assert_eq!(index.position(4), (1, 4));
        assert_eq!(index.position(5), (2, 0));
        assert_eq!(index.position(7), (2, 2));
        assert_eq!(index.position(500), (3, 0));
    }

    #[test]
    fn test_columns_count_utf16_units() {
        let source = "var s = '\u{1F600}'; x";
        let index = LineIndex::new(source);
        let x = source.find('x').unwrap() as u32;
        // the emoji is 4 bytes but 2 UTF-16 units
        assert_eq!(index.position(x), (1, 15));
    }
}
