//! In-memory node store used by the upload and download tests.

use std::collections::HashMap;
use std::sync::Mutex;

use shock_protocol::{FileInformation, NodeId, NodeRecord};

use crate::TransferError;
use crate::download::ChunkFetcher;
use crate::upload::{NodeWriter, UploadMeta};

#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("part {0} rejected")]
    Rejected(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { len: Option<usize> },
    Open,
    Put { part: u32, len: usize },
    Close,
}

#[derive(Default)]
pub struct MemoryStore {
    nodes: Mutex<HashMap<NodeId, Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    fail_part: Mutex<Option<u32>>,
}

impl MemoryStore {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn contents(&self, id: &NodeId) -> Option<Vec<u8>> {
        self.nodes.lock().unwrap().get(id).cloned()
    }

    pub fn fail_on_part(&self, part: u32) {
        *self.fail_part.lock().unwrap() = Some(part);
    }

    pub fn fetcher(&self, id: &NodeId) -> MemoryFetcher {
        MemoryFetcher::new(&self.contents(id).unwrap_or_default())
    }

    fn new_node(&self, meta: &UploadMeta<'_>, data: Vec<u8>) -> NodeRecord {
        let mut nodes = self.nodes.lock().unwrap();
        let id = NodeId::new(format!("00000000-0000-4000-8000-{:012x}", nodes.len() + 1)).unwrap();
        let record = record(&id, meta.filename, data.len());
        nodes.insert(id, data);
        record
    }
}

fn record(id: &NodeId, filename: &str, size: usize) -> NodeRecord {
    NodeRecord {
        id: id.clone(),
        version: None,
        file: FileInformation {
            name: filename.to_string(),
            size: size as u64,
            ..Default::default()
        },
        attributes: None,
        format: None,
    }
}

impl NodeWriter for MemoryStore {
    type Error = TestError;

    fn create_node(
        &self,
        meta: &UploadMeta<'_>,
        file: Option<Vec<u8>>,
    ) -> Result<NodeRecord, TestError> {
        self.calls.lock().unwrap().push(Call::Create {
            len: file.as_ref().map(Vec::len),
        });
        Ok(self.new_node(meta, file.unwrap_or_default()))
    }

    fn open_node(&self, meta: &UploadMeta<'_>) -> Result<NodeRecord, TestError> {
        self.calls.lock().unwrap().push(Call::Open);
        Ok(self.new_node(meta, Vec::new()))
    }

    fn put_part(
        &self,
        id: &NodeId,
        part: u32,
        _filename: &str,
        data: Vec<u8>,
    ) -> Result<(), TestError> {
        self.calls.lock().unwrap().push(Call::Put {
            part,
            len: data.len(),
        });
        if *self.fail_part.lock().unwrap() == Some(part) {
            return Err(TestError::Rejected(part));
        }
        self.nodes
            .lock()
            .unwrap()
            .get_mut(id)
            .unwrap()
            .extend_from_slice(&data);
        Ok(())
    }

    fn close_node(&self, id: &NodeId) -> Result<NodeRecord, TestError> {
        self.calls.lock().unwrap().push(Call::Close);
        let size = self.nodes.lock().unwrap()[id].len();
        Ok(record(id, "data.bin", size))
    }
}

/// Serves chunks of a byte buffer and records which parts were asked for.
pub struct MemoryFetcher {
    data: Vec<u8>,
    fetches: Vec<u32>,
    fail_at: Option<u32>,
    truncate: bool,
}

impl MemoryFetcher {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            fetches: Vec::new(),
            fail_at: None,
            truncate: false,
        }
    }

    pub fn fail_at(&mut self, part: u32) {
        self.fail_at = Some(part);
    }

    /// Serve every chunk one byte short.
    pub fn truncate_chunks(&mut self) {
        self.truncate = true;
    }

    pub fn fetches(&self) -> Vec<u32> {
        self.fetches.clone()
    }
}

impl ChunkFetcher for MemoryFetcher {
    type Error = TestError;

    fn fetch_chunk(&mut self, part: u32, chunk_size: u64) -> Result<Vec<u8>, TestError> {
        self.fetches.push(part);
        if self.fail_at == Some(part) {
            return Err(TestError::Rejected(part));
        }
        let start = (u64::from(part - 1) * chunk_size) as usize;
        let mut end = (start + chunk_size as usize).min(self.data.len());
        if self.truncate {
            end -= 1;
        }
        Ok(self.data[start..end].to_vec())
    }
}
