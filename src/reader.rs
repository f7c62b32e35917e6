//! Position-tracked input for the matcher.
//!
//! A [`Source`] owns the text once per parse session. A [`Cursor`] is an
//! immutable reading position over it: advancing a cursor produces a new
//! cursor and never touches the old one, which is what lets the matcher
//! backtrack by simply holding on to an earlier value. A [`Span`] is a
//! half-open character range into the source with derived line/column
//! accessors for diagnostics.
//!
//! All offsets in this module are *character* (codepoint) offsets, not byte
//! offsets; [`Source::byte_offset`] converts when a byte-addressed span is
//! needed for error rendering.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use miette::{MietteError, MietteSpanContents, SourceCode, SourceSpan, SpanContents};
use serde::{Deserialize, Serialize};

// ============================================================================
// SOURCE
// ============================================================================

/// An immutable text source, created once per parse session and shared
/// between every cursor and span derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    path: String,
    text: String,
    chars: Vec<char>,
}

impl Source {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let chars = text.chars().collect();
        Self {
            path: path.into(),
            text,
            chars,
        }
    }

    /// A source for text that did not come from a file.
    pub fn from_string(text: impl Into<String>) -> Self {
        Self::new("<string>", text)
    }

    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), text))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters in the source.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub(crate) fn chars(&self) -> &[char] {
        &self.chars
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start.min(self.len())..end.min(self.len())]
            .iter()
            .collect()
    }

    /// Byte offset of the given character offset, for byte-addressed
    /// consumers such as miette.
    pub fn byte_offset(&self, char_offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_offset)
            .map(|(byte, _)| byte)
            .unwrap_or(self.text.len())
    }
}

// Attaches the source path to miette's rendering of the underlying text,
// so errors can hand out `&Source` directly as their source code.
impl SourceCode for Source {
    fn read_span<'a>(
        &'a self,
        span: &SourceSpan,
        context_lines_before: usize,
        context_lines_after: usize,
    ) -> Result<Box<dyn SpanContents<'a> + 'a>, MietteError> {
        let contents = self
            .text
            .read_span(span, context_lines_before, context_lines_after)?;
        Ok(Box::new(MietteSpanContents::new_named(
            self.path.clone(),
            contents.data(),
            *contents.span(),
            contents.line(),
            contents.column(),
            contents.line_count(),
        )))
    }
}

// ============================================================================
// CURSOR
// ============================================================================

/// An immutable reading position over a [`Source`].
///
/// `read` returns the consumed span together with the advanced cursor; the
/// cursor it was called on is unchanged, so a caller that keeps the old
/// value has already "rewound".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    source: Arc<Source>,
    offset: usize,
}

impl Cursor {
    pub fn new(source: Arc<Source>) -> Self {
        Self { source, offset: 0 }
    }

    /// Cursor over an in-memory string, positioned at the start.
    pub fn from_string(text: impl Into<String>) -> Self {
        Self::new(Arc::new(Source::from_string(text)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(Arc::new(Source::from_file(path)?)))
    }

    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Characters left to read.
    pub fn remaining(&self) -> usize {
        self.source.len().saturating_sub(self.offset)
    }

    /// True when the cursor sits at end of text. Exhaustion is checked
    /// before every descent; an exhausted cursor can never start a match.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Read up to `length` characters.
    ///
    /// Returns the span covering what was actually read and the cursor after
    /// it. At end of text this returns a zero-length span at the final
    /// offset and a cursor equal to `self`; callers detect exhaustion
    /// through [`Cursor::is_exhausted`], never through a failure here.
    pub fn read(&self, length: usize) -> (Span, Cursor) {
        let source_len = self.source.len();
        if self.offset >= source_len {
            let span = Span::new(Arc::clone(&self.source), source_len, source_len);
            return (span, self.clone());
        }

        let end = (self.offset + length).min(source_len);
        let span = Span::new(Arc::clone(&self.source), self.offset, end);
        let next = Cursor {
            source: Arc::clone(&self.source),
            offset: end,
        };
        (span, next)
    }
}

// ============================================================================
// SPAN
// ============================================================================

/// A half-open character range `[start, end)` into one [`Source`].
///
/// Line and column accessors are derived on demand; a span stores nothing
/// beyond its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    source: Arc<Source>,
    start: usize,
    end: usize,
}

impl Span {
    pub fn new(source: Arc<Source>, start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { source, start, end }
    }

    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn text(&self) -> String {
        self.source.slice(self.start, self.end)
    }

    /// Offset of the first character of the line containing `start`.
    pub fn line_start_offset(&self) -> usize {
        let start = self.start.min(self.source.len());
        self.source.chars()[..start]
            .iter()
            .rposition(|&c| c == '\n')
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Offset just past the last character of the line containing `end`,
    /// excluding the newline itself; clamped at end of text.
    pub fn line_end_offset(&self) -> usize {
        let len = self.source.len();
        let end = self.end.min(len);
        self.source.chars()[end..]
            .iter()
            .position(|&c| c == '\n')
            .map(|i| end + i)
            .unwrap_or(len)
    }

    /// 1-based line number of the line containing `start`.
    pub fn line_number(&self) -> usize {
        let start = self.start.min(self.source.len());
        self.source.chars()[..start]
            .iter()
            .filter(|&&c| c == '\n')
            .count()
            + 1
    }

    /// The complete text of every line the span touches.
    pub fn full_line_text(&self) -> String {
        self.source
            .slice(self.line_start_offset(), self.line_end_offset())
    }

    /// Column of `start`, as an offset from the start of its line.
    pub fn column_start(&self) -> usize {
        self.start - self.line_start_offset()
    }

    /// Column of `end`, as an offset from the start of the line containing
    /// `start`.
    pub fn column_end(&self) -> usize {
        self.end - self.line_start_offset()
    }

    /// The smallest span covering every span in `spans`, which must all
    /// share one source. Returns `None` for an empty set.
    pub fn union(spans: impl IntoIterator<Item = Span>) -> Option<Span> {
        let mut spans = spans.into_iter();
        let first = spans.next()?;
        let mut start = first.start;
        let mut end = first.end;
        let source = first.source;
        for span in spans {
            debug_assert!(Arc::ptr_eq(&source, &span.source));
            start = start.min(span.start);
            end = end.max(span.end);
        }
        Some(Span { source, start, end })
    }

    /// Byte-addressed equivalent of this span, for miette labels.
    pub fn to_source_span(&self) -> SourceSpan {
        let start = self.source.byte_offset(self.start);
        let end = self.source.byte_offset(self.end);
        SourceSpan::from(start..end)
    }
}
