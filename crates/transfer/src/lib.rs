//! Chunked transfer of node files.
//!
//! Uploads read an arbitrary [`std::io::Read`] source in fixed-size chunks and
//! drive the open / put part / close protocol through a [`NodeWriter`].
//! Downloads expose a node's file as a pull-based stream that fetches one
//! chunk at a time through a [`ChunkFetcher`].

mod chunked;
mod download;
mod plan;
mod types;
mod upload;
mod validation;

#[cfg(test)]
mod testutil;

pub use chunked::{ChunkReader, read_chunk};
pub use download::{ChunkFetcher, ChunkedDownload};
pub use plan::{ChunkPlan, chunk_count};
pub use types::{Chunk, UploadSession};
pub use upload::{NodeWriter, UploadMeta, Uploader};
pub use validation::{normalize_format, validate_filename};

/// Default chunk size: 50 MB.
///
/// The server assembles chunked uploads and serves chunked downloads by part
/// number, so the same size must be used for every part of a transfer.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000_000;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be positive")]
    ZeroChunkSize,

    #[error("{total_bytes} bytes in chunks of {chunk_size} exceeds the maximum part count")]
    TooManyChunks { total_bytes: u64, chunk_size: u64 },

    #[error("node has no file")]
    EmptyFile,

    #[error("chunk {part} was {actual} bytes, expected {expected}")]
    UnexpectedChunkLength {
        part: u32,
        expected: u64,
        actual: u64,
    },

    #[error("upload session for node {0} is already closed")]
    SessionClosed(String),

    #[error("Stream is closed.")]
    StreamClosed,

    #[error("stream failed on an earlier read")]
    StreamFailed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
