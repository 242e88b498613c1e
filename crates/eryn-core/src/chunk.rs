//! Chunk extraction for compilation error reporting: given a source buffer
//! and the byte index an error occurred at, compute the (line, column) and
//! a bounded source snippet with a caret offset, the way the original
//! engine's `lib/chunk.*` does.

use alloc::string::String;

/// A line/column/snippet extracted around a source byte index, used to
/// render `"at line:column"` plus a caret-annotated code snippet in
/// compilation error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The extracted snippet, as a lossily-decoded UTF-8 string (source is
    /// byte-oriented; non-UTF-8 bytes are replaced rather than rejected,
    /// since this is diagnostic text, not engine input).
    pub data: String,
    /// Offset of the caret within `data`.
    pub index: usize,
    /// 1-based line number of the original index within `source`.
    pub line: usize,
    /// 1-based column number of the original index within `source`.
    pub column: usize,
}

impl Chunk {
    /// Extracts a chunk around `index` in `source`, bounding the snippet to
    /// roughly `max_chunk_size` bytes (half on each side of `index`, trimmed
    /// to the nearest line boundary).
    #[must_use]
    pub fn extract(source: &[u8], index: usize, max_chunk_size: usize) -> Self {
        let index = index.min(source.len());
        let (line, column) = line_and_column(source, index);

        let half = max_chunk_size / 2;
        let start = walk_left(source, index, half);
        let end = walk_right(source, index, half);

        let data = String::from_utf8_lossy(&source[start..end]).into_owned();
        Chunk { data, index: index - start, line, column }
    }
}

/// Counts 1-based line/column of `index` by scanning `[0, index)`, treating
/// `\r\n` and `\n\r` as a single line break.
fn line_and_column(source: &[u8], index: usize) -> (usize, usize) {
    let mut line = 1usize;
    let mut column = 1usize;
    let mut i = 0usize;
    while i < index {
        let b = source[i];
        if b == b'\n' || b == b'\r' {
            line += 1;
            column = 1;
            // A paired \r\n or \n\r counts as one line break.
            if i + 1 < index && (source[i + 1] == b'\n' || source[i + 1] == b'\r') && source[i + 1] != b {
                i += 1;
            }
        } else {
            column += 1;
        }
        i += 1;
    }
    (line, column)
}

/// Walks left from `index`, stopping at the nearest preceding newline or
/// after at most `limit` bytes, whichever comes first. The newline itself is
/// excluded from the returned start.
fn walk_left(source: &[u8], index: usize, limit: usize) -> usize {
    let floor = index.saturating_sub(limit);
    let mut i = index;
    while i > floor {
        let b = source[i - 1];
        if b == b'\n' || b == b'\r' {
            return i;
        }
        i -= 1;
    }
    i
}

/// Walks right from `index`, stopping at the nearest following newline or
/// after at most `limit` bytes, whichever comes first.
fn walk_right(source: &[u8], index: usize, limit: usize) -> usize {
    let ceiling = (index + limit).min(source.len());
    let mut i = index;
    while i < ceiling {
        let b = source[i];
        if b == b'\n' || b == b'\r' {
            return i;
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_snippet() {
        let src = b"hello world";
        let chunk = Chunk::extract(src, 6, 64);
        assert_eq!(chunk.data, "hello world");
        assert_eq!(chunk.index, 6);
        assert_eq!(chunk.line, 1);
        assert_eq!(chunk.column, 7);
    }

    #[test]
    fn multiline_snippet_bounds_to_current_line() {
        let src = b"line one\nline two error here\nline three";
        let err_at = src.iter().position(|&b| b == b'e').unwrap() + 20; // somewhere in "error"
        let idx = src.windows(5).position(|w| w == b"error").unwrap();
        let chunk = Chunk::extract(src, idx, 64);
        assert_eq!(chunk.data, "line two error here");
        assert_eq!(chunk.line, 2);
        let _ = err_at;
    }

    #[test]
    fn window_is_bounded_by_max_chunk_size() {
        let src = b"aaaaaaaaaaaaaaaaaaaaXbbbbbbbbbbbbbbbbbbbb";
        let idx = 20;
        let chunk = Chunk::extract(src, idx, 10);
        assert!(chunk.data.len() <= 11);
        assert_eq!(chunk.data.as_bytes()[chunk.index], b'X');
    }
}
