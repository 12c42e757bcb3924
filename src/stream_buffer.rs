//! Safe UTF-8 streaming line buffer.
//!
//! Log streams arrive as arbitrary byte chunks; a multi-byte character or a
//! line can be split across two chunks. [`StreamBuffer`] accumulates bytes
//! and only releases complete lines.

use crate::error::StreamError;

/// Accumulates raw stream chunks and drains complete lines.
///
/// Bytes after the last line feed stay buffered, so a partially received
/// line (or a partially received multi-byte character, which can only occur
/// after the last line feed) is never decoded early.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    buffer: Vec<u8>,
}

impl StreamBuffer {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push raw bytes into the buffer.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Drain all complete lines from the buffer.
    ///
    /// Returns lines without their trailing line feed, skipping empty ones.
    /// A line feed is a complete ASCII character, so everything up to and
    /// including the last one either decodes as UTF-8 or the stream itself
    /// is invalid.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Utf8` if the completed portion is not valid
    /// UTF-8.
    pub fn drain_complete_lines(&mut self) -> Result<Vec<String>, StreamError> {
        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };

        let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
        let text =
            String::from_utf8(complete).map_err(|e| StreamError::Utf8(e.to_string()))?;

        Ok(text
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Discard any buffered bytes.
    ///
    /// Called between stream connections so a partial line left over from a
    /// dropped connection never prefixes the next one.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Current buffer size in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
