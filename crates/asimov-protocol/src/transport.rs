//! Newline-delimited transport codec.
//!
//! Frames are single ASCII lines. The decoder strips the `\n` terminator and a
//! preceding `\r` if present, so clients that send CRLF line endings are
//! accepted. The encoder appends a single `\n`.
//!
//! ```text
//! HELO\n        ->  "HELO"
//! MODE FULL\r\n ->  "MODE FULL"
//! ```

use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::MAX_LINE_LENGTH;

/// Codec for newline-terminated protocol lines
#[derive(Debug)]
pub struct LineCodec {
    max_length: usize,
    // Bytes already scanned for a terminator in the current buffer
    scanned: usize,
}

impl LineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            scanned: 0,
        }
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn take_line(&mut self, src: &mut BytesMut, end: usize) -> Result<String, CodecError> {
        let mut line = src.split_to(end + 1);
        self.scanned = 0;

        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }

        Ok(std::str::from_utf8(&line)?.to_string())
    }
}

/// Length of a line without its `\r` terminator.
fn content_length(line: &[u8]) -> usize {
    match line.last() {
        Some(b'\r') => line.len() - 1,
        _ => line.len(),
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let unscanned = src.get(self.scanned..).unwrap_or_default();
        if let Some(offset) = unscanned.iter().position(|byte| *byte == b'\n') {
            let end = self.scanned + offset;
            if content_length(&src[..end]) > self.max_length {
                return Err(CodecError::LineTooLong(self.max_length));
            }
            return self.take_line(src, end).map(Some);
        }

        // A trailing `\r` may still be followed by its `\n`
        if content_length(src) > self.max_length {
            return Err(CodecError::LineTooLong(self.max_length));
        }

        self.scanned = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        // Peer closed mid-line: hand over whatever it sent last
        if src.is_empty() {
            return Ok(None);
        }
        let end = src.len();
        src.put_u8(b'\n');
        self.take_line(src, end).map(Some)
    }
}

impl<T> Encoder<T> for LineCodec
where
    T: AsRef<str>,
{
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.as_ref();

        if line.contains('\n') {
            return Err(CodecError::EmbeddedNewline);
        }
        if line.len() > self.max_length {
            return Err(CodecError::LineTooLong(self.max_length));
        }

        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');

        Ok(())
    }
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Line too long (max: {0} bytes)")]
    LineTooLong(usize),

    #[error("Line contains an embedded newline")]
    EmbeddedNewline,
}
