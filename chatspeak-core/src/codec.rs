//! CRLF line framing for the chat connection
//!
//! Partial trailing data stays buffered until its terminator arrives. Lines
//! longer than the configured limit are skipped up to their next CRLF so a
//! peer that never terminates a line cannot grow the buffer without bound.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

/// Longest line accepted before it is discarded
pub const MAX_LINE_BYTES: usize = 8 * 1024;

const TERMINATOR: &[u8] = b"\r\n";

#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Bytes already scanned without finding a terminator
    scanned: usize,
    /// Inside an oversized line, dropping bytes until the next terminator
    discarding: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            scanned: 0,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            // back up one byte in case the previous read ended on '\r'
            let start = self.scanned.saturating_sub(1);
            let found = buf[start..]
                .windows(TERMINATOR.len())
                .position(|window| window == TERMINATOR)
                .map(|pos| start + pos);

            match found {
                Some(pos) => {
                    let frame = buf.split_to(pos + TERMINATOR.len());
                    self.scanned = 0;

                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }

                    let line = String::from_utf8_lossy(&frame[..pos]).into_owned();
                    return Ok(Some(line));
                }
                None => {
                    if buf.len() > self.max_length {
                        if !self.discarding {
                            warn!("Discarding oversized line (> {} bytes)", self.max_length);
                        }
                        self.discarding = true;
                        // keep the last byte, it may be the first half of a terminator
                        let drop = buf.len() - 1;
                        buf.advance(drop);
                    }
                    self.scanned = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                // unterminated tail of a closed stream is not a line
                buf.clear();
                self.scanned = 0;
                self.discarding = false;
                Ok(None)
            }
        }
    }
}
