//! Newline-delimited JSON decoding for streamed response bodies.

use std::marker::PhantomData;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use memchr::memchr;
use serde::de::DeserializeOwned;

use crate::core::error::OperationError;

pub type ByteChunks = BoxStream<'static, Result<Bytes, OperationError>>;

/// Lazily decodes a byte stream into one `T` per line.
///
/// Pulling the next record is what triggers the next network read, so a slow
/// consumer never makes the server send faster than it is read. The sequence
/// is finite and cannot be restarted: after the body ends, a line fails to
/// decode, or the transport fails, every further call returns `None`.
pub struct LineStream<T> {
    chunks: ByteChunks,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    finished: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> LineStream<T> {
    pub fn new(chunks: ByteChunks) -> Self {
        Self {
            chunks,
            buffer: Vec::new(),
            scanned: 0,
            finished: false,
            _record: PhantomData,
        }
    }

    /// Decode the next non-blank line, reading more of the body as needed.
    pub async fn next_record(&mut self) -> Option<Result<T, OperationError>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(offset) = memchr(b'\n', &self.buffer[self.scanned..]) {
                let newline_pos = self.scanned + offset;
                let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
                self.scanned = 0;
                match self.decode(&line[..newline_pos]) {
                    Some(record) => return Some(record),
                    None => continue,
                }
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => {
                    self.scanned = self.buffer.len();
                    self.buffer.extend_from_slice(&chunk);
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    // The last line may arrive without a trailing newline.
                    let rest = std::mem::take(&mut self.buffer);
                    let record = self.decode(&rest);
                    self.finished = true;
                    return record;
                }
            }
        }
    }

    fn decode(&mut self, line: &[u8]) -> Option<Result<T, OperationError>> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_slice::<T>(line) {
            Ok(record) => Some(Ok(record)),
            Err(err) => {
                self.finished = true;
                Some(Err(OperationError::from(err)))
            }
        }
    }
}
