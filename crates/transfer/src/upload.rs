//! Upload driver: small-file fast path plus the open / parts / close protocol.

use std::io::Read;

use shock_protocol::{Attributes, NodeId, NodeRecord};
use tracing::{debug, info};

use crate::chunked::ChunkReader;
use crate::types::UploadSession;
use crate::validation::{normalize_format, validate_filename};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// What gets declared alongside an uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct UploadMeta<'a> {
    pub filename: &'a str,
    pub format: Option<&'a str>,
    pub attributes: Option<&'a Attributes>,
}

impl<'a> UploadMeta<'a> {
    pub fn new(filename: &'a str) -> Self {
        Self {
            filename,
            format: None,
            attributes: None,
        }
    }

    pub fn with_format(mut self, format: Option<&'a str>) -> Self {
        self.format = normalize_format(format);
        self
    }

    pub fn with_attributes(mut self, attributes: Option<&'a Attributes>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// The node-writing requests an upload is made of.
///
/// The HTTP client implements this on top of its transport; tests use a
/// recording mock.
pub trait NodeWriter {
    type Error: From<TransferError>;

    /// Creates a node in one request, with `file` as its whole content.
    ///
    /// `None` creates a node without a file part.
    fn create_node(
        &self,
        meta: &UploadMeta<'_>,
        file: Option<Vec<u8>>,
    ) -> Result<NodeRecord, Self::Error>;

    /// Creates an empty node that will receive an unknown number of parts.
    fn open_node(&self, meta: &UploadMeta<'_>) -> Result<NodeRecord, Self::Error>;

    /// Sends part `part` (1-based) of the node's file.
    fn put_part(
        &self,
        id: &NodeId,
        part: u32,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<(), Self::Error>;

    /// Finalizes a chunked node; the file is readable only after this.
    fn close_node(&self, id: &NodeId) -> Result<NodeRecord, Self::Error>;
}

/// Streams a byte source into a new node.
#[derive(Debug, Clone, Copy)]
pub struct Uploader {
    chunk_size: usize,
}

impl Default for Uploader {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Uploader {
    pub fn new(chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize);
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Uploads everything `source` yields and returns the finished node.
    ///
    /// Sources that fit in one chunk are sent in a single request. Larger
    /// sources open a node, send each chunk as a numbered part, then close
    /// it. At most two chunks are held in memory at a time. The first failed
    /// request aborts the upload; a node opened by then is left unclosed.
    pub fn upload<W, R>(
        &self,
        writer: &W,
        source: R,
        meta: &UploadMeta<'_>,
    ) -> Result<NodeRecord, W::Error>
    where
        W: NodeWriter + ?Sized,
        R: Read,
    {
        validate_filename(meta.filename)?;
        let mut reader = ChunkReader::new(source, self.chunk_size)?;

        let Some(first) = reader.next_chunk()? else {
            debug!(filename = meta.filename, "empty source, creating node without file");
            return writer.create_node(meta, None);
        };
        let mut next = reader.next_chunk()?;
        if next.is_none() {
            debug!(
                filename = meta.filename,
                bytes = first.len(),
                "single request upload"
            );
            return writer.create_node(meta, Some(first.data));
        }

        let opened = writer.open_node(meta)?;
        let mut session = UploadSession::new(opened.id);
        debug!(node = %session.node_id(), chunk_size = self.chunk_size, "opened chunked upload");

        let mut current = first;
        loop {
            let part = session.next_part()?;
            let bytes = current.len();
            writer.put_part(session.node_id(), part, meta.filename, current.data)?;
            session.part_sent(bytes)?;
            debug!(node = %session.node_id(), part, bytes, "part sent");

            let Some(upcoming) = next.take() else {
                break;
            };
            current = upcoming;
            next = reader.next_chunk()?;
        }

        session.close()?;
        let node = writer.close_node(session.node_id())?;
        info!(
            node = %node.id,
            parts = session.parts_sent(),
            bytes = session.bytes_sent(),
            "chunked upload complete"
        );
        Ok(node)
    }
}
