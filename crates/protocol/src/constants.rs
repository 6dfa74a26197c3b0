//! Field names, query parameters and fixed strings of the Shock REST API.
//!
//! These values are part of the wire contract with the server and must not
//! change.

/// Path segment of the node collection, relative to the server root.
pub const NODE_PATH: &str = "node/";

/// Value of the `id` field in the server root document.
pub const SERVER_ID: &str = "Shock";

/// Multipart field carrying the file of a single-request upload.
pub const UPLOAD_FIELD: &str = "upload";

/// Multipart text field carrying the declared file format.
pub const FORMAT_FIELD: &str = "format";

/// Multipart file field carrying the node attributes as JSON.
pub const ATTRIBUTES_FIELD: &str = "attributes";

/// Filename declared for the attributes part.
pub const ATTRIBUTES_FILENAME: &str = "attribs";

/// Multipart text field controlling the chunked upload protocol.
pub const PARTS_FIELD: &str = "parts";

/// `parts` value that opens a node whose part count is not yet known.
pub const PARTS_UNKNOWN: &str = "unknown";

/// `parts` value that finalizes a chunked upload.
pub const PARTS_CLOSE: &str = "close";

/// Multipart text field requesting a copy of an existing node.
pub const COPY_DATA_FIELD: &str = "copy_data";

/// Scheme prefix of the authorization header value.
pub const AUTH_SCHEME: &str = "OAuth";

/// Query string selecting chunked download by size, without the size and part.
pub const DOWNLOAD_QUERY: &str = "download&index=size";

/// Query suffix asking the server for full user records in ACL responses.
pub const VERBOSITY_FULL: &str = "verbosity=full";

/// Error messages the server sends, across the server versions the client
/// supports.
pub mod messages {
    pub const NO_FILE: &str = "Node has no file";
    pub const NODE_DOES_NOT_EXIST: &str = "Node does not exist";
    pub const NODE_NOT_FOUND: &str = "Node not found";
    pub const TOO_MANY_OWNERS: &str = "Too many users. Nodes may have only one owner.";
    pub const OWNER_ONLY_ACL: &str = "Only the node owner can edit/view node ACL's";
    pub const NON_OWNER_DELETE_SELF: &str =
        "Users that are not node owners can only delete themselves from ACLs.";
    pub const DELETE_OWNERSHIP: &str = "Deleting ownership is not a supported request type.";
}
