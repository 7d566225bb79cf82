//! Newline framing of the server's stdout, and chunk decoding for stderr.
//!
//! Bytes are buffered rather than decoded per chunk so a multi-byte UTF-8
//! sequence split across two reads still decodes to the same text.

use serde_json::Value;

/// One complete, non-blank line taken off the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The line parsed as JSON.
    Message(Value),
    /// The line was not JSON (auxiliary log output); carried verbatim.
    Unparsed(String),
}

/// Accumulates stdout bytes and yields frames for every completed line.
///
/// After each [`push`](Self::push) the buffer holds at most one
/// newline-free fragment: the tail of the last chunk.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the frames it completed, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        complete
            .split(|&b| b == b'\n')
            .filter_map(Self::frame_line)
            .collect()
    }

    /// The pending, newline-unterminated fragment.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    fn frame_line(raw: &[u8]) -> Option<Frame> {
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => Some(Frame::Message(value)),
            Err(_) => Some(Frame::Unparsed(line.to_string())),
        }
    }
}

/// Decodes a byte stream to text chunk by chunk, holding back an
/// incomplete trailing UTF-8 sequence until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Chunks {
    tail: Vec<u8>,
}

impl Utf8Chunks {
    /// Create a decoder with nothing held back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, prefixed by any held-back bytes. Invalid bytes become
    /// U+FFFD; may return an empty string.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.tail.extend_from_slice(chunk);
        let keep = incomplete_suffix(&self.tail);
        let rest = self.tail.split_off(self.tail.len() - keep);
        let text = String::from_utf8_lossy(&self.tail).into_owned();
        self.tail = rest;
        text
    }
}

/// Length of a truncated multi-byte sequence at the end of `bytes`.
fn incomplete_suffix(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(4) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}
