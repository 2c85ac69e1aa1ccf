//! Rebuilding text from retained source ranges.
//!
//! The engine records edits in source order: drop a range, or replace it
//! with synthetic text. Everything between edits is retained verbatim, so
//! output is always a concatenation of original bytes and placeholders.

use std::ops::Range;

use thiserror::Error;

/// A piece of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetainedSpan {
    /// Original bytes.
    Source(Range<usize>),
    /// Placeholder inserted where `anchor` was.
    Synthetic { anchor: usize, text: String },
}

impl RetainedSpan {
    pub fn anchor(&self) -> usize {
        match self {
            RetainedSpan::Source(range) => range.start,
            RetainedSpan::Synthetic { anchor, .. } => *anchor,
        }
    }
}

/// An edit broke the ordering invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("edit {start}..{end} overlaps previous edit ending at {previous_end}")]
    Overlap {
        start: usize,
        end: usize,
        previous_end: usize,
    },

    #[error("edit {start}..{end} is outside the source ({len} bytes)")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("edit boundary {offset} is not on a character boundary")]
    CharBoundary { offset: usize },
}

#[derive(Debug)]
struct Edit {
    range: Range<usize>,
    replacement: Option<String>,
}

/// Collects edits against one source text.
#[derive(Debug)]
pub struct Reconstructor<'s> {
    source: &'s str,
    edits: Vec<Edit>,
    cursor: usize,
}

impl<'s> Reconstructor<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            edits: Vec::new(),
            cursor: 0,
        }
    }

    /// End of the last edit; new edits must start at or after it.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Remove a range. Empty ranges are ignored.
    pub fn drop(&mut self, range: Range<usize>) -> Result<(), ReconstructError> {
        if range.is_empty() {
            return Ok(());
        }
        self.push(range, None)
    }

    /// Replace a range with synthetic text. An empty range inserts.
    pub fn replace(
        &mut self,
        range: Range<usize>,
        text: impl Into<String>,
    ) -> Result<(), ReconstructError> {
        self.push(range, Some(text.into()))
    }

    fn push(
        &mut self,
        range: Range<usize>,
        replacement: Option<String>,
    ) -> Result<(), ReconstructError> {
        let len = self.source.len();
        if range.start > range.end || range.end > len {
            return Err(ReconstructError::OutOfBounds {
                start: range.start,
                end: range.end,
                len,
            });
        }
        if range.start < self.cursor {
            return Err(ReconstructError::Overlap {
                start: range.start,
                end: range.end,
                previous_end: self.cursor,
            });
        }
        for offset in [range.start, range.end] {
            if !self.source.is_char_boundary(offset) {
                return Err(ReconstructError::CharBoundary { offset });
            }
        }

        self.cursor = range.end;
        self.edits.push(Edit { range, replacement });
        Ok(())
    }

    /// The retained spans, in output order.
    pub fn spans(&self) -> Vec<RetainedSpan> {
        let mut spans = Vec::with_capacity(self.edits.len() * 2 + 1);
        let mut cursor = 0;
        for edit in &self.edits {
            if cursor < edit.range.start {
                spans.push(RetainedSpan::Source(cursor..edit.range.start));
            }
            if let Some(text) = &edit.replacement {
                spans.push(RetainedSpan::Synthetic {
                    anchor: edit.range.start,
                    text: text.clone(),
                });
            }
            cursor = edit.range.end;
        }
        if cursor < self.source.len() {
            spans.push(RetainedSpan::Source(cursor..self.source.len()));
        }
        spans
    }

    /// Concatenate the retained spans.
    pub fn finish(self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for span in self.spans() {
            match span {
                RetainedSpan::Source(range) => out.push_str(&self.source[range]),
                RetainedSpan::Synthetic { text, .. } => out.push_str(&text),
            }
        }
        out
    }
}

fn is_blank(text: &str) -> bool {
    text.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r'))
}

/// Start of the line containing `offset`.
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Leading whitespace of the line containing `offset`.
pub fn line_indent(source: &str, offset: usize) -> &str {
    let start = line_start(source, offset);
    let line = &source[start..];
    let width = line
        .bytes()
        .take_while(|b| matches!(b, b' ' | b'\t'))
        .count();
    &line[..width]
}

/// Whether only whitespace precedes `offset` on its line.
pub fn starts_line(source: &str, offset: usize) -> bool {
    is_blank(&source[line_start(source, offset)..offset])
}

/// Range to remove when dropping `span`, including the layout around it.
///
/// A node alone on its lines takes those lines with it, and the blank lines
/// after it when it was preceded by a blank line or the start of the file.
/// A node sharing a line with code takes the horizontal space on one side.
pub fn line_extent(source: &str, span: Range<usize>) -> Range<usize> {
    let bytes = source.as_bytes();
    let len = source.len();
    let start_of_line = line_start(source, span.start);
    let blank_before = is_blank(&source[start_of_line..span.start]);
    let ends_with_newline = span.end > span.start && bytes[span.end - 1] == b'\n';

    let blank_after = ends_with_newline || {
        let rest = &source[span.end..];
        let line_end = rest.find('\n').map_or(len, |i| span.end + i);
        is_blank(&source[span.end..line_end])
    };

    if blank_before && blank_after {
        let mut end = if ends_with_newline {
            span.end
        } else {
            source[span.end..]
                .find('\n')
                .map_or(len, |i| span.end + i + 1)
        };

        let after_blank_line = start_of_line == 0 || {
            let previous = line_start(source, start_of_line - 1);
            is_blank(&source[previous..start_of_line - 1])
        };
        if after_blank_line {
            while end < len {
                let Some(i) = source[end..].find('\n') else {
                    if is_blank(&source[end..]) {
                        end = len;
                    }
                    break;
                };
                if !is_blank(&source[end..end + i]) {
                    break;
                }
                end += i + 1;
            }
        }
        return start_of_line..end;
    }

    if blank_before {
        let mut end = span.end;
        while end < len && matches!(bytes[end], b' ' | b'\t') {
            end += 1;
        }
        return span.start..end;
    }

    let mut start = span.start;
    while start > start_of_line && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let end = if ends_with_newline {
        span.end - 1
    } else {
        span.end
    };
    start..end
}

/// The line terminator `source` uses, judged by its first line.
pub fn line_ending(source: &str) -> &'static str {
    match source.find('\n') {
        Some(i) if source[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Normalize the edges of reconstructed text.
///
/// An all-whitespace result is empty; trailing blank lines collapse into
/// the final newline the original had.
pub fn tidy(text: String, original: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let mut text = text;
    text.truncate(text.trim_end().len());
    if original.ends_with('\n') {
        text.push_str(line_ending(original));
    }
    text
}
