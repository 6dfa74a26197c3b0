use shock_protocol::{InvalidNodeId, ServerError, ServerErrorKind};
use shock_transfer::TransferError;

/// Errors returned by the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered with an error envelope (or an unreadable body).
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{url} is not a valid Shock url: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("This node was deleted.")]
    NodeDeleted,

    #[error(transparent)]
    Transfer(TransferError),
}

impl Error {
    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// The server error kind, if this is a server error.
    pub fn server_kind(&self) -> Option<ServerErrorKind> {
        match self {
            Error::Server(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Recovers the client error carried inside an I/O error.
    ///
    /// [`crate::FileReader`] reports failures through `std::io::Read`, which
    /// wraps them in `std::io::Error`.
    pub fn from_io(err: &std::io::Error) -> Option<&Error> {
        err.get_ref()?.downcast_ref::<Error>()
    }
}

impl From<TransferError> for Error {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::EmptyFile => Error::Server(ServerError::no_file()),
            TransferError::Io(e) => Error::Io(e),
            TransferError::InvalidArgument(msg) => Error::InvalidArgument(msg),
            other => Error::Transfer(other),
        }
    }
}

impl From<InvalidNodeId> for Error {
    fn from(err: InvalidNodeId) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
