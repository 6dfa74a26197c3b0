//! Blocking client for the Shock blob store.
//!
//! Files of any size are uploaded through [`ShockClient::add_node_with_file`],
//! which switches to the chunked open / parts / close protocol once the
//! source exceeds one chunk, and read back through [`FileReader`], a
//! `std::io::Read` that fetches one chunk per request as it is consumed.

mod client;
mod config;
mod error;
mod file;
mod node;
mod transport;

#[cfg(test)]
mod test_server;

pub use client::ShockClient;
pub use config::{AuthToken, ClientConfig};
pub use error::Error;
pub use file::{FileReader, NodeChunks};
pub use node::ShockNode;

pub use shock_protocol::{
    AclRecord, AclType, Attributes, FileInformation, NodeId, NodeRecord, ServerError,
    ServerErrorKind, UserId,
};
