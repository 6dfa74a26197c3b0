//! Wire types for the Shock blob store REST API.
//!
//! Every response is wrapped in an [`Envelope`]; [`envelope::decode`] turns a
//! raw body into either its payload or a typed [`ServerError`].

pub mod constants;
pub mod envelope;
pub mod node_id;
pub mod types;

pub use envelope::{Envelope, ServerError, ServerErrorKind};
pub use node_id::{InvalidNodeId, NodeId};
pub use types::{AclRecord, AclType, Attributes, FileInformation, NodeRecord, ServerInfo, UserId};
