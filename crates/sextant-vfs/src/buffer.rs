use std::error::Error;
use std::fmt;
use std::sync::Arc;

use sextant_core::{FileKey, Position, Range};

/// One incremental edit to an open buffer.
///
/// `range: None` replaces the whole text, matching the full-sync flavor of
/// editor change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub range: Option<Range>,
    pub text: String,
}

impl ContentChange {
    pub fn full(text: impl Into<String>) -> Self {
        Self {
            range: None,
            text: text.into(),
        }
    }

    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    NotOpen(FileKey),
    InvalidRange(Range),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::NotOpen(key) => write!(f, "document is not open: {key}"),
            BufferError::InvalidRange(range) => {
                write!(f, "change range end precedes start: {range:?}")
            }
        }
    }
}

impl Error for BufferError {}

/// In-memory text of one open document plus its version and line table.
///
/// Positions follow the editor protocol: 0-based lines, UTF-16 code unit
/// columns. Out-of-range positions clamp instead of failing, and columns
/// never split a UTF-8 character.
#[derive(Debug, Clone)]
pub struct Buffer {
    text: Arc<String>,
    version: i32,
    line_offsets: Vec<usize>,
}

impl Buffer {
    pub fn new(text: impl Into<String>, version: i32) -> Self {
        let text = text.into();
        let line_offsets = compute_line_offsets(&text);
        Self {
            text: Arc::new(text),
            version,
            line_offsets,
        }
    }

    pub fn text(&self) -> &Arc<String> {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// Applies `changes` in order, each against the text the previous ones
    /// produced, then records `version`. Rejects the whole batch before
    /// touching the text if any change range is inverted.
    pub fn apply(&mut self, version: i32, changes: Vec<ContentChange>) -> Result<(), BufferError> {
        if let Some(range) = changes
            .iter()
            .filter_map(|change| change.range)
            .find(|range| range.end < range.start)
        {
            return Err(BufferError::InvalidRange(range));
        }

        for change in changes {
            match change.range {
                None => self.set_text(change.text),
                Some(range) => {
                    let start = self.position_to_offset(range.start);
                    let end = self.position_to_offset(range.end);
                    let mut text = String::with_capacity(
                        self.text.len() - (end - start) + change.text.len(),
                    );
                    text.push_str(&self.text[..start]);
                    text.push_str(&change.text);
                    text.push_str(&self.text[end..]);
                    self.set_text(text);
                }
            }
        }
        self.version = version;
        Ok(())
    }

    /// Byte offset of `position`, clamped into the text.
    ///
    /// A line past the end maps to the end of the text; a column past the
    /// end of its line maps to the end of that line, excluding the line
    /// terminator. The last line needs no trailing terminator.
    pub fn position_to_offset(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_offsets.len() {
            return self.text.len();
        }
        let start = self.line_offsets[line];
        start + utf16_to_byte_clamped(self.line_text(line), position.character)
    }

    /// Clamps `position` to the nearest valid position in this text.
    pub fn clamp_position(&self, position: Position) -> Position {
        let last_line = self.line_offsets.len().saturating_sub(1) as u32;
        let line = position.line.min(last_line);
        let width = utf16_len(self.line_text(line as usize));
        Position::new(line, position.character.min(width))
    }

    /// Clamps both ends of `range`, collapsing it when the clamped end
    /// precedes the clamped start.
    pub fn clamp_range(&self, range: Range) -> Range {
        let start = self.clamp_position(range.start);
        let mut end = self.clamp_position(range.end);
        if end < start {
            end = start;
        }
        Range::new(start, end)
    }

    /// The text of `line`, excluding its terminator. Empty for lines past
    /// the end.
    fn line_text(&self, line: usize) -> &str {
        let Some(&start) = self.line_offsets.get(line) else {
            return "";
        };
        let end = self
            .line_offsets
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        self.text[start..end].trim_end_matches(['\n', '\r'])
    }

    fn set_text(&mut self, text: String) {
        self.line_offsets = compute_line_offsets(&text);
        self.text = Arc::new(text);
    }
}

/// Byte offsets of every line start. Recognizes `\n`, `\r\n`, and bare `\r`.
fn compute_line_offsets(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut offsets = vec![0];
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                offsets.push(i + 1);
                i += 1;
            }
            b'\r' => {
                let skip = if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                offsets.push(i + skip);
                i += skip;
            }
            _ => i += 1,
        }
    }
    offsets
}

/// Byte offset of UTF-16 column `character` in `line`, clamped to the line
/// end. A column landing inside a surrogate pair clamps to the character's
/// start so the result is always a char boundary.
fn utf16_to_byte_clamped(line: &str, character: u32) -> usize {
    let mut units: u32 = 0;
    for (offset, ch) in line.char_indices() {
        if units >= character {
            return offset;
        }
        units += ch.len_utf16() as u32;
        if units > character {
            return offset;
        }
    }
    line.len()
}

fn utf16_len(line: &str) -> u32 {
    line.chars().map(|ch| ch.len_utf16() as u32).sum()
}
