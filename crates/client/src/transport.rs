//! HTTP plumbing shared by every request: URLs, authorization, decoding.

use std::sync::{Condvar, Mutex, PoisonError, RwLock};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::de::DeserializeOwned;
use shock_protocol::constants::{AUTH_SCHEME, NODE_PATH, SERVER_ID};
use shock_protocol::{ServerError, ServerErrorKind, ServerInfo, envelope};
use tracing::debug;
use url::Url;

use crate::config::{AuthToken, ClientConfig};
use crate::error::Error;

/// Counting gate on requests in flight.
///
/// A slot is held from sending a request until its response body has been
/// read, so at most `max` connections are busy at once.
pub(crate) struct ConnectionLimit {
    max: usize,
    in_use: Mutex<usize>,
    freed: Condvar,
}

impl ConnectionLimit {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            in_use: Mutex::new(0),
            freed: Condvar::new(),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Blocks until a slot is free.
    pub fn acquire(&self) -> Slot<'_> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while *in_use >= self.max {
            in_use = self
                .freed
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += 1;
        Slot { limit: self }
    }

    pub fn in_use(&self) -> usize {
        *self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A held slot; dropping it frees the slot.
pub(crate) struct Slot<'a> {
    limit: &'a ConnectionLimit,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut in_use = self
            .limit
            .in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *in_use -= 1;
        self.limit.freed.notify_one();
    }
}

/// One blocking HTTP client plus the settings every request needs.
///
/// Each transport owns its connection pool and its connection limit, so TLS
/// trust and pool size are whatever its own config says.
pub(crate) struct Transport {
    http: Client,
    limit: ConnectionLimit,
    base_url: Url,
    node_url: Url,
    token: RwLock<Option<AuthToken>>,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        if config.max_connections == 0 {
            return Err(Error::InvalidArgument(
                "max_connections must be at least 1".into(),
            ));
        }
        let base_url = normalize_url(&config.url)?;
        let node_url = base_url
            .join(NODE_PATH)
            .map_err(|e| Error::invalid_url(base_url.as_str(), e.to_string()))?;

        let http = Client::builder()
            .pool_max_idle_per_host(config.max_connections)
            .danger_accept_invalid_certs(config.allow_self_signed_certs)
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()?;

        Ok(Self {
            http,
            limit: ConnectionLimit::new(config.max_connections),
            base_url,
            node_url,
            token: RwLock::new(config.auth_token()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Resolves `rest` (e.g. `<id>/acl/?verbosity=full`) against `node/`.
    pub fn node_url(&self, rest: &str) -> Result<Url, Error> {
        self.node_url
            .join(rest)
            .map_err(|e| Error::invalid_url(format!("{}{rest}", self.node_url), e.to_string()))
    }

    pub fn token(&self) -> Option<AuthToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: Option<AuthToken>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn authorize(&self, req: RequestBuilder) -> Result<RequestBuilder, Error> {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        let Some(token) = guard.as_ref() else {
            return Ok(req);
        };
        let mut value = HeaderValue::from_str(&format!("{AUTH_SCHEME} {}", token.token()))
            .map_err(|_| {
                Error::InvalidArgument("token contains characters not allowed in a header".into())
            })?;
        value.set_sensitive(true);
        Ok(req.header(AUTHORIZATION, value))
    }

    pub fn connection_limit(&self) -> &ConnectionLimit {
        &self.limit
    }

    /// Sends an authorized request and hands the response to `read`.
    ///
    /// The connection slot is held until `read` returns, so a streamed body
    /// counts against the limit for as long as it is being consumed.
    pub fn exchange<T>(
        &self,
        req: RequestBuilder,
        read: impl FnOnce(Response) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let req = self.authorize(req)?;
        let _slot = self.limit.acquire();
        read(req.send()?)
    }

    /// Sends an authorized request and decodes the response envelope.
    pub fn request<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>, Error> {
        self.exchange(req, read_envelope)
    }

    /// Like [`Transport::request`], but a success without `data` is an error.
    pub fn request_data<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, Error> {
        self.exchange(req, |resp| {
            let status = resp.status().as_u16();
            read_envelope(resp)?.ok_or_else(|| {
                ServerError::new(
                    ServerErrorKind::Http,
                    status,
                    "Shock response carried no data",
                )
                .into()
            })
        })
    }

    /// Fetches the server root document and checks that it is a Shock server.
    pub fn server_info(&self) -> Result<ServerInfo, Error> {
        let body = {
            let _slot = self.limit.acquire();
            self.http.get(self.base_url.clone()).send()?.bytes()?
        };
        let info: ServerInfo = serde_json::from_slice(&body)
            .map_err(|e| Error::invalid_url(self.base_url.as_str(), e.to_string()))?;
        if info.id != SERVER_ID {
            return Err(Error::invalid_url(
                self.base_url.as_str(),
                format!("server identifies as {:?}", info.id),
            ));
        }
        debug!(url = %self.base_url, version = %info.version, "server check passed");
        Ok(info)
    }
}

/// Decodes the envelope of a response, whatever its HTTP status.
pub(crate) fn read_envelope<T: DeserializeOwned>(resp: Response) -> Result<Option<T>, Error> {
    let status = resp.status();
    let body = resp.bytes()?;
    Ok(envelope::decode(
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        &body,
    )?)
}

/// Error for a non-success response whose body is not a file.
pub(crate) fn error_from_response(resp: Response) -> Error {
    let status = resp.status();
    match read_envelope::<serde_json::Value>(resp) {
        Err(err) => err,
        Ok(_) => ServerError::from_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status"),
        )
        .into(),
    }
}

/// Validates a server URL and brings it into the form `scheme://host/path/`.
pub(crate) fn normalize_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid_url(raw, "scheme must be http or https"));
    }
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
