//! Newline-delimited fragment decoding for streaming responses.
//!
//! The server emits one JSON object per line, each optionally prefixed with `data: `.
//! Chunks arrive with arbitrary boundaries, so bytes are buffered until a newline is
//! seen.  Lines that are not JSON are skipped; JSON that does not describe a fragment
//! is an error.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};
use crate::observability::{SKIPPED_LINES, STREAM_BYTES, STREAM_FRAGMENTS};
use crate::types::ResponseFragment;

/// Prefix stripped from each line before parsing.
pub const DATA_PREFIX: &str = "data: ";

/// Default upper bound on a buffered, not yet terminated line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

/// The stream buffer for one exchange.
///
/// Holds bytes rather than text so that a UTF-8 sequence split across chunks is
/// reassembled before decoding.  Returned lines are skipped over by offset and only
/// compacted away on the next push.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    // Start of the first line not yet returned.
    start: usize,
    // Everything before this offset has been searched for a newline.
    scanned: usize,
    // Length of the unterminated tail.
    tail: usize,
    max_line_bytes: usize,
}

impl LineDecoder {
    /// Create an empty decoder that refuses partial lines longer than `max_line_bytes`.
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            start: 0,
            scanned: 0,
            tail: 0,
            max_line_bytes,
        }
    }

    /// Append a chunk to the buffer.
    ///
    /// # Errors
    ///
    /// Returns an encoding error when the unterminated tail of the buffer grows past
    /// the configured limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buffer.extend_from_slice(chunk);
        self.tail = match chunk.iter().rposition(|b| *b == b'\n') {
            Some(idx) => chunk.len() - idx - 1,
            None => self.tail + chunk.len(),
        };
        if self.tail > self.max_line_bytes {
            return Err(Error::encoding(
                format!(
                    "buffered line exceeds {} bytes without a newline",
                    self.max_line_bytes
                ),
                None,
            ));
        }
        Ok(())
    }

    /// Split the next complete line off the front of the buffer.
    ///
    /// The newline is consumed and not returned.  Invalid UTF-8 is replaced.
    pub fn next_line(&mut self) -> Option<String> {
        let from = self.scanned.max(self.start);
        let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = from + offset;
        let line = String::from_utf8_lossy(&self.buffer[self.start..end]).into_owned();
        self.start = end + 1;
        self.scanned = self.start;
        Some(line)
    }

    /// Number of bytes buffered but not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.start
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

/// Interpret one line of the response.
///
/// Returns `None` when the line is not JSON and should be skipped, and `Some(Err(_))`
/// when it is JSON but not a fragment.
pub fn parse_line(line: &str) -> Option<Result<ResponseFragment>> {
    let line = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    let value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
    Some(serde_json::from_value(value).map_err(Error::from))
}

/// Bound every read of `byte_stream` by `timeout`.
///
/// An elapsed read yields a timeout error and ends the stream.
pub fn with_read_timeout<S>(
    byte_stream: S,
    timeout: Duration,
) -> impl Stream<Item = Result<Bytes>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    stream::unfold(Some(byte_stream), move |state| async move {
        let mut stream = state?;
        match tokio::time::timeout(timeout, stream.next()).await {
            Ok(Some(item)) => Some((item, Some(stream))),
            Ok(None) => None,
            Err(_) => Some((
                Err(Error::timeout(
                    "no data received from server",
                    Some(timeout.as_secs_f64()),
                )),
                None,
            )),
        }
    })
}

/// Process a stream of bytes into a stream of response fragments.
///
/// The output ends after the first error, or when the input ends.  Data left in the
/// buffer without a terminating newline is discarded.
pub fn process_fragments<S>(
    byte_stream: S,
    max_line_bytes: usize,
) -> impl Stream<Item = Result<ResponseFragment>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let decoder = LineDecoder::new(max_line_bytes);

    stream::unfold(
        (byte_stream, decoder, false),
        |(mut stream, mut decoder, done)| async move {
            if done {
                return None;
            }
            loop {
                // First drain complete lines already in the buffer
                while let Some(line) = decoder.next_line() {
                    match parse_line(&line) {
                        Some(Ok(fragment)) => {
                            STREAM_FRAGMENTS.click();
                            return Some((Ok(fragment), (stream, decoder, false)));
                        }
                        Some(Err(err)) => return Some((Err(err), (stream, decoder, true))),
                        None => SKIPPED_LINES.click(),
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        if let Err(err) = decoder.push(&bytes) {
                            return Some((Err(err), (stream, decoder, true)));
                        }
                    }
                    Some(Err(err)) => return Some((Err(err), (stream, decoder, true))),
                    None => return None,
                }
            }
        },
    )
}
