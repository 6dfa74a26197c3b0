use std::io::{Read, Write};
use std::sync::{Arc, PoisonError, RwLock};

use shock_protocol::constants::{COPY_DATA_FIELD, VERBOSITY_FULL};
use shock_protocol::{AclRecord, AclType, Attributes, NodeId, NodeRecord};
use shock_transfer::{ChunkedDownload, UploadMeta, Uploader};
use tracing::{debug, info};
use url::Url;

use crate::config::{AuthToken, ClientConfig};
use crate::error::Error;
use crate::file::{FileReader, NodeChunks};
use crate::node::ShockNode;
use crate::transport::Transport;

/// Client for one Shock server.
///
/// Cheap to clone; clones share the connection pool, the token and the
/// cached server version. Safe to use from many threads at once.
#[derive(Clone)]
pub struct ShockClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<Transport>,
    uploader: Uploader,
    version: RwLock<String>,
}

impl ShockClient {
    /// Connects to the server described by `config`.
    ///
    /// The URL must use http or https and must answer `GET /` with the Shock
    /// root document; otherwise [`Error::InvalidUrl`] is returned.
    pub fn connect(config: ClientConfig) -> Result<Self, Error> {
        let uploader = Uploader::new(config.chunk_size)?;
        let transport = Transport::new(&config)?;
        let server = transport.server_info()?;
        info!(url = %transport.base_url(), version = %server.version, "connected to Shock");

        Ok(Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                uploader,
                version: RwLock::new(server.version),
            }),
        })
    }

    fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    /// Base URL of the server, always ending in `/`.
    pub fn url(&self) -> &Url {
        self.transport().base_url()
    }

    /// Server version as of connecting or the last [`ShockClient::remote_version`].
    pub fn shock_version(&self) -> String {
        self.inner
            .version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Asks the server for its version and caches it.
    pub fn remote_version(&self) -> Result<String, Error> {
        let server = self.transport().server_info()?;
        *self
            .inner
            .version
            .write()
            .unwrap_or_else(PoisonError::into_inner) = server.version.clone();
        Ok(server.version)
    }

    /// Replaces the token sent with every request; `None` goes anonymous.
    pub fn update_token(&self, token: Option<AuthToken>) {
        self.transport().set_token(token);
    }

    pub fn token(&self) -> Option<AuthToken> {
        self.transport().token()
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.uploader.chunk_size()
    }

    fn node(&self, record: NodeRecord) -> ShockNode {
        ShockNode::new(record, self.clone())
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Creates an empty node.
    pub fn add_node(&self) -> Result<ShockNode, Error> {
        let record = self.transport().post_node(None)?;
        debug!(node = %record.id, "created empty node");
        Ok(self.node(record))
    }

    /// Creates a node holding only `attributes`.
    pub fn add_node_with_attributes(&self, attributes: &Attributes) -> Result<ShockNode, Error> {
        let record = self.transport().create_with_attributes(attributes)?;
        Ok(self.node(record))
    }

    /// Creates a node from everything `source` yields.
    ///
    /// `format` is ignored when blank. The source is read one chunk at a
    /// time, so its size is not needed up front.
    pub fn add_node_with_file<R: Read>(
        &self,
        attributes: Option<&Attributes>,
        source: R,
        filename: &str,
        format: Option<&str>,
    ) -> Result<ShockNode, Error> {
        let meta = UploadMeta::new(filename)
            .with_format(format)
            .with_attributes(attributes);
        let record = self.inner.uploader.upload(self.transport(), source, &meta)?;
        info!(node = %record.id, bytes = record.file.size, filename, "uploaded file");
        Ok(self.node(record))
    }

    /// Fetches a node. The handle reflects the node at this moment only.
    pub fn get_node(&self, id: &NodeId) -> Result<ShockNode, Error> {
        let url = self.transport().node_url(id.as_str())?;
        let record = self
            .transport()
            .request_data(self.transport().http().get(url))?;
        Ok(self.node(record))
    }

    pub fn delete_node(&self, id: &NodeId) -> Result<(), Error> {
        let url = self.transport().node_url(id.as_str())?;
        self.transport()
            .request::<serde_json::Value>(self.transport().http().delete(url))?;
        debug!(node = %id, "deleted node");
        Ok(())
    }

    /// Copies a node, including attributes, into one owned by the caller.
    ///
    /// With `unless_already_owned`, a node already owned by the token's user
    /// is returned as is.
    pub fn copy_node(&self, id: &NodeId, unless_already_owned: bool) -> Result<ShockNode, Error> {
        let source = self.get_node(id)?;
        if unless_already_owned {
            if let Some(token) = self.token() {
                let acl = self.get_acls(id)?;
                if acl.owner.username.as_deref() == Some(token.user_name()) {
                    return Ok(source);
                }
            }
        }
        let form = reqwest::blocking::multipart::Form::new()
            .text(COPY_DATA_FIELD, id.as_str().to_string());
        let record = self.transport().post_node(Some(form))?;
        debug!(source = %id, copy = %record.id, "copied node");
        Ok(self.node(record))
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Opens the node's file for streaming.
    ///
    /// Fails with a `NoFile` server error, without a request, when the node
    /// has no file.
    pub fn get_file(&self, node: &ShockNode) -> Result<FileReader, Error> {
        let size = node.file_information()?.size;
        let chunks = NodeChunks::new(Arc::clone(&self.inner.transport), node.id()?.clone());
        Ok(ChunkedDownload::new(chunks, size, self.chunk_size() as u64)?)
    }

    pub fn get_file_by_id(&self, id: &NodeId) -> Result<FileReader, Error> {
        self.get_file(&self.get_node(id)?)
    }

    /// Writes the node's whole file into `sink`, returning the byte count.
    pub fn write_file<W: Write>(&self, node: &ShockNode, sink: &mut W) -> Result<u64, Error> {
        self.get_file(node)?.write_to(sink)
    }

    pub fn write_file_by_id<W: Write>(&self, id: &NodeId, sink: &mut W) -> Result<u64, Error> {
        self.write_file(&self.get_node(id)?, sink)
    }

    // -----------------------------------------------------------------------
    // ACLs
    // -----------------------------------------------------------------------

    /// All ACLs of a node.
    pub fn get_acls(&self, id: &NodeId) -> Result<AclRecord, Error> {
        self.acl_request(
            reqwest::Method::GET,
            &format!("{id}/acl/?{VERBOSITY_FULL}"),
        )
    }

    /// One ACL of a node. The server still reports the owner.
    pub fn get_acls_of_type(&self, id: &NodeId, acl: AclType) -> Result<AclRecord, Error> {
        self.acl_request(
            reqwest::Method::GET,
            &format!("{id}{}?{VERBOSITY_FULL}", acl.url_fragment()),
        )
    }

    /// Adds users to a node's ACL and returns the updated ACLs.
    pub fn add_to_node_acl<S: AsRef<str>>(
        &self,
        id: &NodeId,
        users: &[S],
        acl: AclType,
    ) -> Result<AclRecord, Error> {
        let rest = acl_users_path(id, users, acl)?;
        self.acl_request(reqwest::Method::PUT, &rest)
    }

    /// Removes users from a node's ACL and returns the updated ACLs.
    pub fn remove_from_node_acl<S: AsRef<str>>(
        &self,
        id: &NodeId,
        users: &[S],
        acl: AclType,
    ) -> Result<AclRecord, Error> {
        let rest = acl_users_path(id, users, acl)?;
        self.acl_request(reqwest::Method::DELETE, &rest)
    }

    /// Makes a node readable by anyone, or takes that away.
    pub fn set_publicly_readable(&self, id: &NodeId, public: bool) -> Result<AclRecord, Error> {
        let method = if public {
            reqwest::Method::PUT
        } else {
            reqwest::Method::DELETE
        };
        self.acl_request(method, &format!("{id}/acl/public_read?{VERBOSITY_FULL}"))
    }

    fn acl_request(&self, method: reqwest::Method, rest: &str) -> Result<AclRecord, Error> {
        let url = self.transport().node_url(rest)?;
        self.transport()
            .request_data(self.transport().http().request(method, url))
    }
}

/// `<id>/acl/<type>/?users=a,b;verbosity=full`, after checking the user list.
fn acl_users_path<S: AsRef<str>>(
    id: &NodeId,
    users: &[S],
    acl: AclType,
) -> Result<String, Error> {
    if users.is_empty() {
        return Err(Error::InvalidArgument(
            "user list cannot be null or empty".into(),
        ));
    }
    let mut encoded = Vec::with_capacity(users.len());
    for user in users {
        let user = user.as_ref();
        if user.is_empty() {
            return Err(Error::InvalidArgument(
                "user cannot be null or the empty string".into(),
            ));
        }
        encoded.push(url::form_urlencoded::byte_serialize(user.as_bytes()).collect::<String>());
    }
    Ok(format!(
        "{id}{}?users={};{VERBOSITY_FULL}",
        acl.url_fragment(),
        encoded.join(",")
    ))
}

impl std::fmt::Debug for ShockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShockClient")
            .field("url", &self.url().as_str())
            .field("version", &self.shock_version())
            .field("chunk_size", &self.chunk_size())
            .finish()
    }
}
