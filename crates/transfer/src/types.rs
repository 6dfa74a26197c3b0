use shock_protocol::NodeId;

use crate::TransferError;

/// A chunk of upload data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the source stream.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Bookkeeping for one chunked upload.
///
/// Parts are numbered from 1 and must be sent strictly in order. After
/// [`UploadSession::close`] no further parts may be issued.
#[derive(Debug)]
pub struct UploadSession {
    node_id: NodeId,
    next_part: u32,
    bytes_sent: u64,
    closed: bool,
}

impl UploadSession {
    /// Starts tracking an upload into the freshly opened node `node_id`.
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            next_part: 1,
            bytes_sent: 0,
            closed: false,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Number the next part will be sent under.
    pub fn next_part(&self) -> Result<u32, TransferError> {
        if self.closed {
            return Err(TransferError::SessionClosed(self.node_id.to_string()));
        }
        Ok(self.next_part)
    }

    /// Records that part [`UploadSession::next_part`] was accepted.
    pub fn part_sent(&mut self, bytes: usize) -> Result<(), TransferError> {
        if self.closed {
            return Err(TransferError::SessionClosed(self.node_id.to_string()));
        }
        self.bytes_sent += bytes as u64;
        self.next_part = self
            .next_part
            .checked_add(1)
            .ok_or(TransferError::TooManyChunks {
                total_bytes: self.bytes_sent,
                chunk_size: bytes as u64,
            })?;
        Ok(())
    }

    /// Parts accepted so far.
    pub fn parts_sent(&self) -> u32 {
        self.next_part - 1
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Marks the session closed; the caller is about to finalize the node.
    pub fn close(&mut self) -> Result<(), TransferError> {
        if self.closed {
            return Err(TransferError::SessionClosed(self.node_id.to_string()));
        }
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
