//! Download reader: a node's file as one continuous, lazily fetched stream.

use std::io::{self, BufRead, Read, Write};

use tracing::debug;

use crate::TransferError;
use crate::plan::ChunkPlan;

/// Fetches numbered chunks of one node's file.
pub trait ChunkFetcher {
    type Error: From<TransferError> + std::error::Error + Send + Sync + 'static;

    /// Returns the bytes of chunk `part` (1-based) at `chunk_size`.
    fn fetch_chunk(&mut self, part: u32, chunk_size: u64) -> Result<Vec<u8>, Self::Error>;

    /// Writes chunk `part` straight into `sink`, returning the byte count.
    ///
    /// Implementations that can stream a response body should override this
    /// to avoid buffering the chunk.
    fn copy_chunk(
        &mut self,
        part: u32,
        chunk_size: u64,
        sink: &mut dyn Write,
    ) -> Result<u64, Self::Error> {
        let data = self.fetch_chunk(part, chunk_size)?;
        sink.write_all(&data).map_err(TransferError::from)?;
        Ok(data.len() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Failed,
    Closed,
}

/// Pull-based reader over a chunked file.
///
/// Chunk `i` is requested only once the bytes before it have been consumed.
/// Reads spanning a chunk boundary fetch the next chunk mid-call, so a short
/// read only happens at end of file or right before an error. Once a fetch
/// fails the stream stays failed; after [`ChunkedDownload::close`] every read
/// errors with "Stream is closed.".
pub struct ChunkedDownload<F: ChunkFetcher> {
    fetcher: F,
    plan: ChunkPlan,
    next_part: u32,
    buf: Vec<u8>,
    pos: usize,
    delivered: u64,
    state: State,
    pending: Option<F::Error>,
}

impl<F: ChunkFetcher> ChunkedDownload<F> {
    /// Prepares to read `total_bytes` from `fetcher`. No request is made.
    ///
    /// A file of size zero is reported as [`TransferError::EmptyFile`].
    pub fn new(fetcher: F, total_bytes: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if total_bytes == 0 {
            return Err(TransferError::EmptyFile);
        }
        let plan = ChunkPlan::new(total_bytes, chunk_size)?;
        Ok(Self {
            fetcher,
            plan,
            next_part: 1,
            buf: Vec::new(),
            pos: 0,
            delivered: 0,
            state: State::Open,
            pending: None,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.plan.total_bytes()
    }

    pub fn chunk_count(&self) -> u32 {
        self.plan.chunk_count()
    }

    /// Bytes handed to the caller so far.
    pub fn position(&self) -> u64 {
        self.delivered
    }

    pub fn is_exhausted(&self) -> bool {
        self.delivered == self.plan.total_bytes()
    }

    pub fn get_ref(&self) -> &F {
        &self.fetcher
    }

    /// Stops the stream. Buffered data is dropped and no further requests
    /// are made.
    pub fn close(&mut self) {
        self.state = State::Closed;
        self.buf = Vec::new();
        self.pos = 0;
        self.pending = None;
    }

    fn check_open(&mut self) -> Result<(), F::Error> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        match self.state {
            State::Open => Ok(()),
            State::Failed => Err(TransferError::StreamFailed.into()),
            State::Closed => Err(TransferError::StreamClosed.into()),
        }
    }

    fn fail<E: Into<F::Error>>(&mut self, err: E) -> F::Error {
        self.state = State::Failed;
        self.buf = Vec::new();
        self.pos = 0;
        err.into()
    }

    /// Makes sure unread bytes are buffered. Returns `false` at end of file.
    fn fill(&mut self) -> Result<bool, F::Error> {
        self.check_open()?;
        if self.pos < self.buf.len() {
            return Ok(true);
        }
        let part = self.next_part;
        let Some(expected) = self.plan.chunk_len(part) else {
            return Ok(false);
        };

        debug!(part, of = self.plan.chunk_count(), "fetching chunk");
        let data = match self.fetcher.fetch_chunk(part, self.plan.chunk_size()) {
            Ok(data) => data,
            Err(e) => return Err(self.fail(e)),
        };
        if data.len() as u64 != expected {
            return Err(self.fail(TransferError::UnexpectedChunkLength {
                part,
                expected,
                actual: data.len() as u64,
            }));
        }
        self.buf = data;
        self.pos = 0;
        self.next_part += 1;
        Ok(true)
    }

    /// Returns the rest of the current chunk, fetching the next one if
    /// needed, or `None` at end of file.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>, F::Error> {
        if !self.fill()? {
            return Ok(None);
        }
        let start = self.pos;
        self.pos = self.buf.len();
        self.delivered += (self.pos - start) as u64;
        Ok(Some(&self.buf[start..]))
    }

    /// Writes the remainder of the file into `sink`.
    ///
    /// Buffered bytes go first, then every remaining chunk is copied
    /// directly. Returns the number of bytes written.
    pub fn write_to<W: Write>(&mut self, sink: &mut W) -> Result<u64, F::Error> {
        self.check_open()?;
        let mut written = 0u64;

        if self.pos < self.buf.len() {
            sink.write_all(&self.buf[self.pos..])
                .map_err(TransferError::from)?;
            written += (self.buf.len() - self.pos) as u64;
            self.delivered += (self.buf.len() - self.pos) as u64;
            self.pos = self.buf.len();
        }

        while let Some(expected) = self.plan.chunk_len(self.next_part) {
            let part = self.next_part;
            debug!(part, of = self.plan.chunk_count(), "copying chunk");
            let copied = match self
                .fetcher
                .copy_chunk(part, self.plan.chunk_size(), &mut *sink)
            {
                Ok(n) => n,
                Err(e) => return Err(self.fail(e)),
            };
            if copied != expected {
                return Err(self.fail(TransferError::UnexpectedChunkLength {
                    part,
                    expected,
                    actual: copied,
                }));
            }
            self.next_part += 1;
            self.delivered += copied;
            written += copied;
        }
        Ok(written)
    }
}

impl<F: ChunkFetcher> Read for ChunkedDownload<F> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut written = 0;
        while written < out.len() {
            match self.fill() {
                Ok(true) => {
                    let available = &self.buf[self.pos..];
                    let n = available.len().min(out.len() - written);
                    out[written..written + n].copy_from_slice(&available[..n]);
                    self.pos += n;
                    self.delivered += n as u64;
                    written += n;
                }
                Ok(false) => break,
                Err(e) if written == 0 => return Err(io::Error::other(e)),
                Err(e) => {
                    // Hand over what we have; the error surfaces on the next call.
                    self.pending = Some(e);
                    break;
                }
            }
        }
        Ok(written)
    }
}

impl<F: ChunkFetcher> BufRead for ChunkedDownload<F> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self.fill() {
            Ok(true) => Ok(&self.buf[self.pos..]),
            Ok(false) => Ok(&[]),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.buf.len() - self.pos);
        self.pos += amt;
        self.delivered += amt as u64;
    }
}

impl<F: ChunkFetcher> std::fmt::Debug for ChunkedDownload<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedDownload")
            .field("plan", &self.plan)
            .field("next_part", &self.next_part)
            .field("position", &self.delivered)
            .field("state", &self.state)
            .finish()
    }
}
