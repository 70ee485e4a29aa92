//! Wire format for streamed generate responses.
//!
//! The server answers with newline delimited JSON. Network chunks do not line
//! up with records, so [`LineDecoder`] buffers raw bytes until a full line is
//! available and only then decodes it.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Body of a generate request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
}

/// One streamed record of a generate response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GenerateChunk {
    /// Text fragment produced since the previous record.
    pub response: String,
    /// Set on the final record.
    pub done: bool,
}

/// Parses a single line into a [`GenerateChunk`].
pub fn parse_chunk(line: &str) -> Result<GenerateChunk, serde_json::Error> {
    serde_json::from_str(line.trim())
}

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every line completed by them.
    ///
    /// Blank lines and lines that are not valid UTF-8 are dropped. Bytes after
    /// the last newline stay buffered.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            if let Some(text) = decode_line(&self.buf[start..end]) {
                lines.push(text);
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Returns whatever remains once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        decode_line(&line)
    }
}

fn decode_line(bytes: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.trim(),
        Err(e) => {
            warn!(target: "llm", error = %e, len = bytes.len(), "skipping record that is not UTF-8");
            return None;
        }
    };
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
