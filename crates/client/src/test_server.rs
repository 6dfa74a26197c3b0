//! A small in-process Shock server for the client tests.
//!
//! Serves the node, chunked upload, chunked download and ACL endpoints from
//! memory and records every request it receives, multipart fields included.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State as AxumState};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub data: Vec<u8>,
}

impl FormField {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub fields: Vec<FormField>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        query_pairs(self.query.as_deref())
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// `"METHOD path"`, for compact assertions.
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Default)]
struct StoredNode {
    name: String,
    data: Vec<u8>,
    format: String,
    attributes: Option<Value>,
    open_parts: Option<BTreeMap<u32, Vec<u8>>>,
    owner: String,
    read: Vec<String>,
    write: Vec<String>,
    delete: Vec<String>,
    public_read: bool,
}

struct State {
    nodes: HashMap<String, StoredNode>,
    requests: Vec<Recorded>,
    require_auth: bool,
    legacy: bool,
    server_id: String,
    scripted: VecDeque<(u16, String)>,
}

pub struct MockShock {
    url: String,
    server: Arc<Server>,
}

struct Reply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    fn ok(data: Value) -> Self {
        Self::json(200, json!({"status": 200, "data": data, "error": null}))
    }

    fn err(status: u16, message: &str) -> Self {
        Self::json(
            status,
            json!({"status": status, "data": null, "error": [message]}),
        )
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

/// What the HTTP handler shares: the Shock state plus request accounting.
struct Server {
    state: Mutex<State>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockShock {
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    /// Rejects node requests without an `Authorization` header.
    pub fn start_requiring_auth() -> Self {
        Self::start_with(|s| s.require_auth = true)
    }

    /// Older wording: "Node does not exist" and bare-uuid ACL entries.
    pub fn start_legacy() -> Self {
        Self::start_with(|s| s.legacy = true)
    }

    /// Answers `GET /` like some other service.
    pub fn start_impostor() -> Self {
        Self::start_with(|s| s.server_id = "Workspace".into())
    }

    /// Holds every request for `delay` before answering it.
    pub fn start_slow(delay: Duration) -> Self {
        Self::spawn(|_| {}, delay)
    }

    fn start_with(configure: impl FnOnce(&mut State)) -> Self {
        Self::spawn(configure, Duration::ZERO)
    }

    fn spawn(configure: impl FnOnce(&mut State), delay: Duration) -> Self {
        let mut state = State {
            nodes: HashMap::new(),
            requests: Vec::new(),
            require_auth: false,
            legacy: false,
            server_id: "Shock".into(),
            scripted: VecDeque::new(),
        };
        configure(&mut state);
        let server = Arc::new(Server {
            state: Mutex::new(state),
            delay,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        });

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/");

        let app = Router::new()
            .fallback(handle)
            .layer(DefaultBodyLimit::disable())
            .with_state(Arc::clone(&server));
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self { url, server }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A client for this server, authenticated as `user` when given.
    pub fn client(&self, chunk_size: usize, user: Option<&str>) -> crate::ShockClient {
        let mut config = self.config().with_chunk_size(chunk_size);
        if let Some(user) = user {
            config = config.with_token(crate::AuthToken::new(user, user));
        }
        crate::ShockClient::connect(config).unwrap()
    }

    /// A config pointing at this server, for tests that tune other settings.
    pub fn config(&self) -> crate::ClientConfig {
        crate::ClientConfig::new(self.url())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.server.state.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state().requests.clone()
    }

    /// Most requests the server was ever handling at the same moment.
    pub fn peak_in_flight(&self) -> usize {
        self.server.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Requests under `/node`, skipping the root document checks.
    pub fn node_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with("/node"))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    /// Serves the next node request with `status` and a raw `body`.
    pub fn script(&self, status: u16, body: &str) {
        self.state().scripted.push_back((status, body.to_string()));
    }

    /// Serves the next node request with an error envelope.
    pub fn script_error(&self, status: u16, message: &str) {
        let body = json!({"status": status, "data": null, "error": [message]}).to_string();
        self.script(status, &body);
    }

    pub fn node_data(&self, id: &str) -> Option<Vec<u8>> {
        self.state().nodes.get(id).map(|n| n.data.clone())
    }

    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    /// Deletes a node behind the client's back.
    pub fn remove_node(&self, id: &str) {
        self.state().nodes.remove(id);
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

async fn handle(
    AxumState(server): AxumState<Arc<Server>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let in_flight = server.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    server.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
    if !server.delay.is_zero() {
        tokio::time::sleep(server.delay).await;
    }

    let fields = match read_form(&headers, body).await {
        Ok(fields) => fields,
        Err(err) => {
            server.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Reply::err(400, &format!("Invalid multipart body: {err}")).into_response();
        }
    };
    let request = Recorded {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_string(), value)
            })
            .collect(),
        fields,
    };
    let reply = route(&server.state, request);
    server.in_flight.fetch_sub(1, Ordering::SeqCst);
    reply.into_response()
}

/// Collects every part of a `multipart/form-data` body; other bodies have none.
async fn read_form(headers: &HeaderMap, body: Bytes) -> Result<Vec<FormField>, multer::Error> {
    let Some(boundary) = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
    else {
        return Ok(Vec::new());
    };

    let stream = futures_util::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let content_length = field
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = field.bytes().await?.to_vec();
        fields.push(FormField {
            name,
            filename,
            content_type,
            content_length,
            data,
        });
    }
    Ok(fields)
}

fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    let query = query.unwrap_or_default().replace(';', "&");
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

// ---------------------------------------------------------------------------
// Shock API
// ---------------------------------------------------------------------------

fn route(state: &Mutex<State>, req: Recorded) -> Reply {
    let mut st = state.lock().unwrap();
    st.requests.push(req.clone());

    if req.path == "/" {
        return Reply::json(
            200,
            json!({
                "id": st.server_id,
                "version": "0.9.6",
                "url": "http://localhost:7044/",
                "type": "Shock",
                "resources": ["node"],
            }),
        );
    }
    let Some(rest) = req.path.strip_prefix("/node") else {
        return Reply::err(404, "Not found");
    };
    if let Some((status, body)) = st.scripted.pop_front() {
        return Reply {
            status,
            content_type: "application/json",
            body: body.into_bytes(),
        };
    }

    let user = req
        .header("authorization")
        .and_then(|h| h.strip_prefix("OAuth "))
        .map(str::to_string);
    if st.require_auth && user.is_none() {
        return Reply::err(401, "No Authorization");
    }
    let user = user.unwrap_or_else(|| "anonymous".into());

    let segments: Vec<&str> = rest.trim_matches('/').split('/').collect();
    match (req.method.as_str(), segments.as_slice()) {
        ("POST", [""]) => create(&mut st, &req, &user),
        (_, [""]) => Reply::err(400, "Invalid request method"),
        ("GET", [id]) if req.query.as_deref().is_some_and(|q| q.starts_with("download")) => {
            download(&st, id, &req)
        }
        ("GET", [id]) => match st.nodes.get(*id) {
            Some(node) => Reply::ok(node_json(id, node)),
            None => missing(&st),
        },
        ("PUT", [id]) => put(&mut st, id, &req),
        ("DELETE", [id]) => match st.nodes.remove(*id) {
            Some(_) => Reply::ok(Value::Null),
            None => missing(&st),
        },
        (method, [id, "acl"]) if method == "GET" => acl_reply(&st, id, None),
        (method, [id, "acl", kind]) => acl(&mut st, method, id, kind, &req, &user),
        _ => Reply::err(400, "Invalid request"),
    }
}

fn missing(st: &State) -> Reply {
    if st.legacy {
        Reply::err(400, "Node does not exist")
    } else {
        Reply::err(404, "Node not found")
    }
}

fn node_json(id: &str, node: &StoredNode) -> Value {
    json!({
        "id": id,
        "version": format!("{:032x}", node.data.len() as u128 * 7919),
        "file": {
            "name": node.name,
            "size": node.data.len(),
            "checksum": {},
            "format": node.format,
            "virtual": false,
        },
        "attributes": node.attributes,
        "indexes": {},
        "tags": null,
        "linkage": [],
        "type": "basic",
    })
}

fn create(st: &mut State, req: &Recorded, user: &str) -> Reply {
    let id = uuid::Uuid::new_v4().to_string();
    let mut node = StoredNode {
        owner: user.to_string(),
        read: vec![user.to_string()],
        write: vec![user.to_string()],
        delete: vec![user.to_string()],
        ..Default::default()
    };

    if let Some(source) = req.field("copy_data") {
        let Some(src) = st.nodes.get(&source.text()) else {
            return missing(st);
        };
        node.name = src.name.clone();
        node.data = src.data.clone();
        node.format = src.format.clone();
        node.attributes = src.attributes.clone();
    }
    if let Some(upload) = req.field("upload") {
        node.name = upload.filename.clone().unwrap_or_default();
        node.data = upload.data.clone();
    }
    if req.field("parts").is_some_and(|f| f.text() == "unknown") {
        node.open_parts = Some(BTreeMap::new());
    }
    if let Some(format) = req.field("format") {
        node.format = format.text();
    }
    if let Some(attributes) = req.field("attributes") {
        match serde_json::from_slice(&attributes.data) {
            Ok(value) => node.attributes = Some(value),
            Err(_) => return Reply::err(400, "Invalid attributes"),
        }
    }

    let reply = Reply::ok(node_json(&id, &node));
    st.nodes.insert(id, node);
    reply
}

fn put(st: &mut State, id: &str, req: &Recorded) -> Reply {
    if !st.nodes.contains_key(id) {
        return missing(st);
    }
    let node = st.nodes.get_mut(id).unwrap();

    if req.field("parts").is_some_and(|f| f.text() == "close") {
        let Some(parts) = node.open_parts.take() else {
            return Reply::err(400, "Node is not a partial node");
        };
        node.data = parts.into_values().flatten().collect();
        return Reply::ok(node_json(id, node));
    }

    let Some(parts) = node.open_parts.as_mut() else {
        return Reply::err(400, "Node is not a partial node");
    };
    for field in &req.fields {
        let Ok(index) = field.name.parse::<u32>() else {
            return Reply::err(400, "Invalid part name");
        };
        parts.insert(index, field.data.clone());
        if let Some(name) = &field.filename {
            node.name = name.clone();
        }
    }
    Reply::ok(node_json(id, node))
}

fn download(st: &State, id: &str, req: &Recorded) -> Reply {
    let Some(node) = st.nodes.get(id) else {
        return missing(st);
    };
    if node.data.is_empty() {
        return Reply::err(400, "Node has no file");
    }
    let chunk_size: usize = req
        .query_param("chunk_size")
        .and_then(|v| v.parse().ok())
        .unwrap_or(node.data.len());
    let part: usize = req
        .query_param("part")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    if part == 0 || (part - 1) * chunk_size >= node.data.len() {
        return Reply::err(400, "Index record out of range");
    }
    let start = (part - 1) * chunk_size;
    let end = (start + chunk_size).min(node.data.len());
    Reply {
        status: 200,
        content_type: "application/octet-stream",
        body: node.data[start..end].to_vec(),
    }
}

fn user_json(st: &State, name: &str) -> Value {
    if st.legacy {
        json!(format!("uuid-{name}"))
    } else {
        json!({"uuid": format!("uuid-{name}"), "username": name})
    }
}

fn acl_reply(st: &State, id: &str, kind: Option<&str>) -> Reply {
    let Some(node) = st.nodes.get(id) else {
        return missing(st);
    };
    let list = |names: &[String]| -> Value {
        Value::Array(names.iter().map(|n| user_json(st, n)).collect())
    };
    let mut acl = serde_json::Map::new();
    acl.insert("owner".into(), user_json(st, &node.owner));
    let wanted = |k: &str| kind.is_none_or(|want| want == "all" || want == k);
    if wanted("read") {
        acl.insert("read".into(), list(&node.read));
    }
    if wanted("write") {
        acl.insert("write".into(), list(&node.write));
    }
    if wanted("delete") {
        acl.insert("delete".into(), list(&node.delete));
    }
    acl.insert(
        "public".into(),
        json!({"read": node.public_read, "write": false, "delete": false}),
    );
    Reply::ok(Value::Object(acl))
}

fn acl(
    st: &mut State,
    method: &str,
    id: &str,
    kind: &str,
    req: &Recorded,
    user: &str,
) -> Reply {
    if method == "GET" {
        return acl_reply(st, id, Some(kind));
    }
    if !st.nodes.contains_key(id) {
        return missing(st);
    }
    let node = st.nodes.get_mut(id).unwrap();
    if node.owner != user {
        return Reply::err(400, "Only the node owner can edit/view node ACL's");
    }

    let users: Vec<String> = req
        .query_param("users")
        .map(|u| u.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    let adding = method == "PUT";

    match kind {
        "public_read" => node.public_read = adding,
        "owner" if !adding => {
            return Reply::err(400, "Deleting ownership is not a supported request type.");
        }
        "owner" if users.len() > 1 => {
            return Reply::err(400, "Too many users. Nodes may have only one owner.");
        }
        "owner" => {
            if let Some(new_owner) = users.first() {
                node.owner = new_owner.clone();
            }
        }
        "read" | "write" | "delete" | "all" => {
            let mut lists: Vec<&mut Vec<String>> = Vec::new();
            match kind {
                "read" => lists.push(&mut node.read),
                "write" => lists.push(&mut node.write),
                "delete" => lists.push(&mut node.delete),
                _ => {
                    lists.push(&mut node.read);
                    lists.push(&mut node.write);
                    lists.push(&mut node.delete);
                }
            }
            for list in lists {
                for u in &users {
                    if adding && !list.contains(u) {
                        list.push(u.clone());
                    } else if !adding {
                        list.retain(|x| x != u);
                    }
                }
            }
        }
        _ => return Reply::err(400, "Invalid acl type"),
    }
    acl_reply(st, id, None)
}
