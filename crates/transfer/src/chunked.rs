use std::io::{ErrorKind, Read};

use crate::TransferError;
use crate::types::Chunk;

// ---------------------------------------------------------------------------
// Filling reads
// ---------------------------------------------------------------------------

/// Reads from `source` until `limit` bytes are collected or the source ends.
///
/// A single `read` may return fewer bytes than asked for without being at
/// end of stream; this keeps reading until it really is.
pub fn read_chunk<R: Read + ?Sized>(source: &mut R, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Splits any byte source into fixed-size chunks.
///
/// Every chunk but the last is exactly `chunk_size` bytes. Once a short or
/// empty chunk has been produced the reader is exhausted and the source is
/// not read again.
pub struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    offset: u64,
    exhausted: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize);
        }
        Ok(Self {
            source,
            chunk_size,
            offset: 0,
            exhausted: false,
        })
    }

    /// Reads the next chunk. Returns `None` at end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.exhausted {
            return Ok(None);
        }

        let data = read_chunk(&mut self.source, self.chunk_size)?;
        if data.len() < self.chunk_size {
            self.exhausted = true;
        }
        if data.is_empty() {
            return Ok(None);
        }

        let chunk = Chunk {
            offset: self.offset,
            data,
        };
        self.offset += chunk.len() as u64;
        Ok(Some(chunk))
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
