use std::ops::Range;

use crate::TransferError;

/// Number of chunks needed for `total_bytes` at `chunk_size`.
///
/// Zero bytes need zero chunks. An exact multiple of `chunk_size` ends in a
/// full chunk, never an empty trailing one.
pub fn chunk_count(total_bytes: u64, chunk_size: u64) -> Result<u32, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::ZeroChunkSize);
    }
    u32::try_from(total_bytes.div_ceil(chunk_size)).map_err(|_| TransferError::TooManyChunks {
        total_bytes,
        chunk_size,
    })
}

/// How a file of known size splits into 1-based numbered chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_bytes: u64,
    chunk_size: u64,
    chunk_count: u32,
}

impl ChunkPlan {
    pub fn new(total_bytes: u64, chunk_size: u64) -> Result<Self, TransferError> {
        let chunk_count = chunk_count(total_bytes, chunk_size)?;
        Ok(Self {
            total_bytes,
            chunk_size,
            chunk_count,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Size of the final chunk; 0 only for an empty file.
    pub fn last_chunk_bytes(&self) -> u64 {
        if self.chunk_count == 0 {
            0
        } else {
            self.total_bytes - u64::from(self.chunk_count - 1) * self.chunk_size
        }
    }

    /// Byte range of chunk `part`, or `None` if `part` is out of range.
    pub fn chunk_range(&self, part: u32) -> Option<Range<u64>> {
        if part == 0 || part > self.chunk_count {
            return None;
        }
        let start = u64::from(part - 1) * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_bytes);
        Some(start..end)
    }

    /// Length of chunk `part`, or `None` if `part` is out of range.
    pub fn chunk_len(&self, part: u32) -> Option<u64> {
        self.chunk_range(part).map(|r| r.end - r.start)
    }
}
