use serde::{Deserialize, Serialize};
use shock_transfer::DEFAULT_CHUNK_SIZE;

/// Connections kept per host when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// A token presented to the server as `Authorization: OAuth <token>`.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    token: String,
    user_name: String,
}

impl AuthToken {
    pub fn new(token: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_name: user_name.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The user the token was issued to, as the caller claims it.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("user_name", &self.user_name)
            .finish()
    }
}

/// Settings for a [`crate::ShockClient`].
///
/// Everything here is fixed for the lifetime of the client, including TLS
/// trust and the connection pool size.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the server.
    pub url: String,
    pub token: Option<String>,
    /// User name the token belongs to; used by `copy_node`.
    pub user: Option<String>,
    /// Accept self-signed and otherwise invalid TLS certificates.
    pub allow_self_signed_certs: bool,
    /// Most requests in flight at once; further requests wait for a slot.
    pub max_connections: usize,
    /// Chunk size for uploads and downloads, in bytes.
    pub chunk_size: usize,
    /// Whole-request timeout; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7044/".into(),
            token: None,
            user: None,
            allow_self_signed_certs: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: None,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: AuthToken) -> Self {
        self.token = Some(token.token);
        self.user = Some(token.user_name);
        self
    }

    pub fn with_self_signed_certs(mut self, allow: bool) -> Self {
        self.allow_self_signed_certs = allow;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The configured token, if any.
    pub fn auth_token(&self) -> Option<AuthToken> {
        self.token
            .as_ref()
            .map(|t| AuthToken::new(t.clone(), self.user.clone().unwrap_or_default()))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("allow_self_signed_certs", &self.allow_self_signed_certs)
            .field("max_connections", &self.max_connections)
            .field("chunk_size", &self.chunk_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
