//! Byte-to-record reassembly for the stream body.
//!
//! The stream body is a sequence of JSON records separated by `\r\n`, with
//! no framing beyond the delimiter. Chunks arrive at arbitrary boundaries,
//! so the decoder keeps the unterminated tail between `feed` calls. The
//! buffer is bytes rather than text: a delimiter or a multi-byte UTF-8
//! sequence may be split across chunks.

use serde_json::Value;
use tracing::warn;

use crate::stream::proto::StreamRecord;

const RECORD_DELIMITER: &[u8] = b"\r\n";

/// Stateful reassembler and classifier for one connection.
///
/// Not restartable across connections; a fresh decoder is created for each
/// established stream and the pending tail is discarded with it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates a decoder with an empty partial buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and drains every complete record it terminates.
    ///
    /// Empty frames (bare keepalive newlines) are skipped; frames that fail
    /// to parse as JSON are logged and skipped without interrupting later
    /// records. The unterminated remainder stays buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(index) = find_delimiter(&self.buffer) {
            let frame: Vec<u8> = self
                .buffer
                .drain(..index + RECORD_DELIMITER.len())
                .take(index)
                .collect();
            if frame.is_empty() {
                continue;
            }
            match serde_json::from_slice::<Value>(&frame) {
                Ok(value) => records.push(StreamRecord::classify(value)),
                Err(error) => {
                    warn!(event = "record_parse_failed", error = %error);
                }
            }
        }
        records
    }

    /// Number of buffered bytes awaiting a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(RECORD_DELIMITER.len())
        .position(|window| window == RECORD_DELIMITER)
}
