use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::messages;

/// Kind of a server-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    /// The token is missing, invalid, or lacks rights for the request.
    Authorization,
    /// The node exists but has no file.
    NoFile,
    /// The node does not exist.
    NoNode,
    /// An ACL change the server refuses (ownership rules).
    IllegalShare,
    /// An attempt to remove the owner from a node.
    IllegalUnshare,
    /// Anything else.
    Http,
}

/// A failure reported by the server, decoded from the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Shock error {status}: {message}")]
pub struct ServerError {
    pub kind: ServerErrorKind,
    pub status: u16,
    pub message: String,
}

impl ServerError {
    pub fn new(kind: ServerErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    /// The error raised locally for a node whose file size is zero.
    pub fn no_file() -> Self {
        Self::new(ServerErrorKind::NoFile, 400, messages::NO_FILE)
    }

    /// Maps a `(status, message)` pair onto an error kind.
    ///
    /// Server versions word the missing-node condition differently; both
    /// wordings decode to [`ServerErrorKind::NoNode`] with the message
    /// `"Node not found"`.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match (status, message.as_str()) {
            (401, _) => ServerErrorKind::Authorization,
            (400, messages::NO_FILE) => ServerErrorKind::NoFile,
            (400, messages::NODE_DOES_NOT_EXIST) => {
                return Self::new(ServerErrorKind::NoNode, status, messages::NODE_NOT_FOUND);
            }
            (
                400,
                messages::TOO_MANY_OWNERS
                | messages::OWNER_ONLY_ACL
                | messages::NON_OWNER_DELETE_SELF,
            ) => ServerErrorKind::IllegalShare,
            (400, messages::DELETE_OWNERSHIP) => ServerErrorKind::IllegalUnshare,
            (404, messages::NODE_NOT_FOUND) => ServerErrorKind::NoNode,
            _ => ServerErrorKind::Http,
        };
        Self {
            kind,
            status,
            message,
        }
    }

    /// Error for a body that could not be parsed as an envelope.
    pub fn invalid_response(
        http_status: u16,
        reason: &str,
        parse_error: &serde_json::Error,
    ) -> Self {
        Self::new(
            ServerErrorKind::Http,
            http_status,
            format!(
                "Invalid Shock response. Server said {http_status} {reason}. JSON parser said {parse_error}"
            ),
        )
    }
}

/// The `{status, data, error}` envelope wrapping every API response.
///
/// `error` is either null or a list holding one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: u16,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<Vec<String>>,
}

impl<T> Envelope<T> {
    /// Returns the decoded error, if the envelope carries one.
    pub fn server_error(&self) -> Option<ServerError> {
        self.error.as_ref().map(|errors| {
            let message = errors.first().cloned().unwrap_or_default();
            ServerError::from_status(self.status, message)
        })
    }

    /// Converts the envelope into its payload or its decoded error.
    ///
    /// A successful envelope with a null `data` yields `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, ServerError> {
        match self.server_error() {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

/// Decodes a response body.
///
/// `http_status` and `reason` only matter when the body is not a valid
/// envelope; otherwise the envelope's own `status` drives error mapping.
pub fn decode<T: DeserializeOwned>(
    http_status: u16,
    reason: &str,
    body: &[u8],
) -> Result<Option<T>, ServerError> {
    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| ServerError::invalid_response(http_status, reason, &e))?;
    envelope.into_result()
}
