//! Delimiter span scanning.
//!
//! Finds `$...$` (inline) and `$$...$$` (display) spans in a text snapshot.
//! A backslash escapes the character after it, so `\$` never opens or closes
//! a span. Offsets are byte offsets into the scanned string; since both
//! delimiter and escape are ASCII, every reported offset is a char boundary.

use std::ops::Range;

const DOLLAR: u8 = b'$';
const ESCAPE: u8 = b'\\';

/// A delimiter-bounded region located in one text snapshot.
///
/// `open..inner_start` is the leading delimiter, `inner_start..inner_end` the
/// expression, `inner_end..close` the trailing delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquationSpan {
    pub open: usize,
    pub inner_start: usize,
    pub inner_end: usize,
    pub close: usize,
    /// Both delimiters are `$$`.
    pub display: bool,
}

impl EquationSpan {
    /// Width of each delimiter in bytes.
    pub fn delimiter_len(&self) -> usize {
        if self.display { 2 } else { 1 }
    }

    /// Byte range of the expression between the delimiters.
    pub fn inner(&self) -> Range<usize> {
        self.inner_start..self.inner_end
    }

    /// Length of the expression in bytes.
    pub fn inner_len(&self) -> usize {
        self.inner_end - self.inner_start
    }

    /// Byte range of the whole span including delimiters.
    pub fn outer(&self) -> Range<usize> {
        self.open..self.close
    }

    /// The expression text, if `text` is the snapshot this span came from.
    pub fn inner_text<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.inner())
    }

    /// Convert a byte range of `text` into UTF-16 code unit offsets.
    ///
    /// DOM ranges count UTF-16 code units, so any offset handed to a browser
    /// selection goes through here first.
    pub fn utf16_range(text: &str, bytes: Range<usize>) -> Range<u32> {
        utf16_offset(text, bytes.start)..utf16_offset(text, bytes.end)
    }
}

/// Number of UTF-16 code units in `text[..byte_offset]`.
///
/// Offsets past the end clamp to the full length.
pub fn utf16_offset(text: &str, byte_offset: usize) -> u32 {
    let end = byte_offset.min(text.len());
    text.get(..end)
        .map(|prefix| prefix.encode_utf16().count() as u32)
        .unwrap_or_else(|| text.encode_utf16().count() as u32)
}

/// Cheap pre-filter: does the text contain a delimiter character at all.
pub fn contains_delimiter(text: &str) -> bool {
    text.as_bytes().contains(&DOLLAR)
}

/// Scan `text` for all non-overlapping spans, in left-to-right order.
pub fn find_dollar_spans(text: &str) -> Vec<EquationSpan> {
    Scanner::new(text).collect()
}

/// The first span in `text`, without scanning the rest.
pub fn first_dollar_span(text: &str) -> Option<EquationSpan> {
    Scanner::new(text).next()
}

/// Iterator over the spans of one text snapshot.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    /// Position of the next unescaped `$` at or after `from`.
    fn next_marker(&self, from: usize) -> Option<usize> {
        let mut i = from;
        while i < self.bytes.len() {
            match self.bytes[i] {
                ESCAPE => i += 2,
                DOLLAR => return Some(i),
                _ => i += 1,
            }
        }
        None
    }

    /// End offset of the closer matching an opener of the given width,
    /// searching from `from`.
    fn find_close(&self, from: usize, display: bool) -> Option<usize> {
        let mut k = from;
        loop {
            let at = self.next_marker(k)?;
            if !display {
                return Some(at + 1);
            }
            if self.bytes.get(at + 1) == Some(&DOLLAR) {
                return Some(at + 2);
            }
            // Lone `$` inside a display span is content.
            k = at + 1;
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = EquationSpan;

    fn next(&mut self) -> Option<EquationSpan> {
        while self.pos < self.bytes.len() {
            let open = self.next_marker(self.pos)?;
            let display = self.bytes.get(open + 1) == Some(&DOLLAR);
            let width = if display { 2 } else { 1 };

            let Some(close) = self.find_close(open + width, display) else {
                // Unmatched opener: retry one character further on.
                self.pos = open + 1;
                continue;
            };
            self.pos = close;

            let inner_start = open + width;
            let inner_end = close - width;
            if inner_end > inner_start {
                return Some(EquationSpan {
                    open,
                    inner_start,
                    inner_end,
                    close,
                    display,
                });
            }
        }
        None
    }
}
