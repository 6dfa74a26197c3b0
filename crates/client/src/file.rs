//! Node file transfer over HTTP: multipart upload requests and chunk GETs.

use std::io::Write;
use std::sync::Arc;

use reqwest::blocking::Response;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue};
use shock_protocol::constants::{
    ATTRIBUTES_FIELD, ATTRIBUTES_FILENAME, DOWNLOAD_QUERY, FORMAT_FIELD, PARTS_CLOSE,
    PARTS_FIELD, PARTS_UNKNOWN, UPLOAD_FIELD,
};
use shock_protocol::{Attributes, NodeId, NodeRecord};
use shock_transfer::{ChunkFetcher, ChunkedDownload, NodeWriter, UploadMeta};
use tracing::debug;

use crate::error::Error;
use crate::transport::{Transport, error_from_response};

/// A node's file as a `std::io::Read` + `std::io::BufRead` stream.
///
/// Chunks are requested one at a time as the stream is consumed. Errors
/// reach the caller as `std::io::Error`; use [`Error::from_io`] to get the
/// typed error back.
pub type FileReader = ChunkedDownload<NodeChunks>;

/// Fetches numbered chunks of one node's file.
pub struct NodeChunks {
    transport: Arc<Transport>,
    id: NodeId,
}

impl NodeChunks {
    pub(crate) fn new(transport: Arc<Transport>, id: NodeId) -> Self {
        Self { transport, id }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.id
    }

    /// GETs one chunk and hands the successful response to `read`.
    fn get<T>(
        &self,
        part: u32,
        chunk_size: u64,
        read: impl FnOnce(Response) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let url = self.transport.node_url(&format!(
            "{}/?{DOWNLOAD_QUERY}&chunk_size={chunk_size}&part={part}",
            self.id
        ))?;
        debug!(node = %self.id, part, "GET chunk");
        self.transport
            .exchange(self.transport.http().get(url), |resp| {
                if !resp.status().is_success() {
                    return Err(error_from_response(resp));
                }
                read(resp)
            })
    }
}

impl ChunkFetcher for NodeChunks {
    type Error = Error;

    fn fetch_chunk(&mut self, part: u32, chunk_size: u64) -> Result<Vec<u8>, Error> {
        self.get(part, chunk_size, |resp| Ok(resp.bytes()?.to_vec()))
    }

    fn copy_chunk(
        &mut self,
        part: u32,
        chunk_size: u64,
        sink: &mut dyn Write,
    ) -> Result<u64, Error> {
        self.get(part, chunk_size, |mut resp| Ok(resp.copy_to(sink)?))
    }
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// A binary part with a declared filename and `Content-Length`.
fn file_part(data: Vec<u8>, filename: &str) -> Part {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len()));
    Part::bytes(data)
        .file_name(filename.to_string())
        .headers(headers)
}

fn attributes_part(attributes: &Attributes) -> Result<Part, Error> {
    let json = serde_json::to_vec(attributes)?;
    Ok(file_part(json, ATTRIBUTES_FILENAME).mime_str("application/json")?)
}

/// Adds the optional `format` and `attributes` fields.
fn with_meta(mut form: Form, meta: &UploadMeta<'_>) -> Result<Form, Error> {
    if let Some(format) = meta.format {
        form = form.text(FORMAT_FIELD, format.to_string());
    }
    if let Some(attributes) = meta.attributes {
        form = form.part(ATTRIBUTES_FIELD, attributes_part(attributes)?);
    }
    Ok(form)
}

impl Transport {
    /// `POST node/`, with a multipart body when there is something to send.
    pub(crate) fn post_node(&self, form: Option<Form>) -> Result<NodeRecord, Error> {
        let url = self.node_url("")?;
        let mut req = self.http().post(url);
        if let Some(form) = form {
            req = req.multipart(form);
        }
        self.request_data(req)
    }

    pub(crate) fn create_with_attributes(
        &self,
        attributes: &Attributes,
    ) -> Result<NodeRecord, Error> {
        let form = Form::new().part(ATTRIBUTES_FIELD, attributes_part(attributes)?);
        self.post_node(Some(form))
    }
}

impl NodeWriter for Transport {
    type Error = Error;

    fn create_node(
        &self,
        meta: &UploadMeta<'_>,
        file: Option<Vec<u8>>,
    ) -> Result<NodeRecord, Error> {
        if file.is_none() && meta.format.is_none() && meta.attributes.is_none() {
            return self.post_node(None);
        }
        let mut form = with_meta(Form::new(), meta)?;
        if let Some(data) = file {
            form = form.part(UPLOAD_FIELD, file_part(data, meta.filename));
        }
        self.post_node(Some(form))
    }

    fn open_node(&self, meta: &UploadMeta<'_>) -> Result<NodeRecord, Error> {
        let form = with_meta(Form::new().text(PARTS_FIELD, PARTS_UNKNOWN), meta)?;
        self.post_node(Some(form))
    }

    fn put_part(
        &self,
        id: &NodeId,
        part: u32,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<(), Error> {
        let form = Form::new().part(part.to_string(), file_part(data, filename));
        let url = self.node_url(id.as_str())?;
        self.request::<serde_json::Value>(self.http().put(url).multipart(form))?;
        Ok(())
    }

    fn close_node(&self, id: &NodeId) -> Result<NodeRecord, Error> {
        let form = Form::new().text(PARTS_FIELD, PARTS_CLOSE);
        let url = self.node_url(id.as_str())?;
        self.request_data(self.http().put(url).multipart(form))
    }
}
