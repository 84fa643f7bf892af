//! Minimal HTTP/1.1 asset service for integration tests.
//!
//! Implements the `/v1/assets` REST routes over an in-memory store: multipart
//! create, GET/DELETE of asset JSON (revision in the ETag header), PUT of
//! master and rendition bytes, rendition generation and raw data downloads.
//! One thread per connection, `Connection: close` on every response.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use assetsync_core::model::{AssetRef, RenditionDescriptor, RenditionKind};
use assetsync_core::transport::GenerateRenditions;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default)]
pub struct AssetServerOptions {
    /// Required bearer token; requests without it get 401.
    pub token: Option<String>,
    /// Renditions the service produces itself on create.
    pub create_kinds: Vec<RenditionKind>,
    /// Pause between 16 KiB chunks of a data download.
    pub chunk_delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Store {
    pub assets: HashMap<String, AssetRef>,
    /// Keyed by (asset id, data path such as `master` or `renditions/thumbnail2x`).
    pub blobs: HashMap<(String, String), Vec<u8>>,
    /// `METHOD path` of every request, in arrival order.
    pub requests: Vec<String>,
    pub generate_requests: Vec<GenerateRenditions>,
    next_id: u64,
}

impl Store {
    pub fn count(&self, request: &str) -> usize {
        self.requests.iter().filter(|r| *r == request).count()
    }

    /// Advance an asset's revision as if it changed on the service.
    pub fn bump_revision(&mut self, id: &str) -> String {
        let asset = self.assets.get_mut(id).expect("asset exists");
        let next = revision_number(asset.revision.as_deref()) + 1;
        let revision = format!("r{next}");
        asset.revision = Some(revision.clone());
        revision
    }

    fn add_rendition(&mut self, id: &str, kind: RenditionKind) -> RenditionDescriptor {
        let asset = self.assets.get_mut(id).expect("asset exists");
        let bytes = format!("{kind}@{}", asset.revision.as_deref().unwrap_or("")).into_bytes();
        let descriptor = RenditionDescriptor {
            kind,
            size: bytes.len() as u64,
            available: true,
            metadata: Default::default(),
        };
        asset.merge_renditions([descriptor.clone()]);
        self.blobs
            .insert((id.to_string(), format!("renditions/{kind}")), bytes);
        descriptor
    }
}

fn revision_number(revision: Option<&str>) -> u64 {
    revision
        .and_then(|r| r.trim_start_matches('r').parse().ok())
        .unwrap_or(0)
}

pub struct AssetServer {
    pub base_url: String,
    store: Arc<Mutex<Store>>,
}

impl AssetServer {
    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

/// Starts the service in a background thread. It runs until the process exits.
pub fn start(opts: AssetServerOptions) -> AssetServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let store = Arc::new(Mutex::new(Store::default()));
    let shared = Arc::clone(&store);
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let store = Arc::clone(&shared);
            let opts = Arc::clone(&opts);
            thread::spawn(move || handle(stream, &store, &opts));
        }
    });
    AssetServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        store,
    }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Reply {
    status: &'static str,
    headers: Vec<String>,
    body: Vec<u8>,
}

impl Reply {
    fn json(status: &'static str, value: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec!["Content-Type: application/json".into()],
            body: serde_json::to_vec(value).unwrap(),
        }
    }

    fn error(status: &'static str, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    fn empty(status: &'static str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn with_etag(mut self, revision: Option<&str>) -> Self {
        if let Some(r) = revision {
            self.headers.push(format!("ETag: \"{r}\""));
        }
        self
    }
}

fn handle(mut stream: TcpStream, store: &Mutex<Store>, opts: &AssetServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    store
        .lock()
        .unwrap()
        .requests
        .push(format!("{} {}", request.method, request.path));

    if let Some(token) = &opts.token {
        let expected = format!("Bearer {token}");
        if request.header("authorization") != Some(expected.as_str()) {
            let _ = write_reply(&mut stream, Reply::error("401 Unauthorized", "missing credentials"), None);
            return;
        }
    }

    let reply = route(&request, store, opts);
    let delay = if request.method == "GET" && reply.headers.iter().all(|h| !h.starts_with("Content-Type: application/json")) {
        opts.chunk_delay
    } else {
        None
    };
    let _ = write_reply(&mut stream, reply, delay);
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&data[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut start = lines.next()?.split_whitespace();
    let method = start.next()?.to_string();
    let path = start.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    let len: usize = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = data[header_end..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn write_reply(stream: &mut TcpStream, reply: Reply, chunk_delay: Option<Duration>) -> std::io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for h in &reply.headers {
        head.push_str(h);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())?;
    match chunk_delay {
        Some(delay) => {
            for chunk in reply.body.chunks(16 * 1024) {
                stream.write_all(chunk)?;
                stream.flush()?;
                thread::sleep(delay);
            }
        }
        None => stream.write_all(&reply.body)?,
    }
    stream.flush()
}

fn route(request: &Request, store: &Mutex<Store>, opts: &AssetServerOptions) -> Reply {
    let Some(rest) = request.path.strip_prefix("/v1/assets") else {
        return Reply::error("404 Not Found", "no such route");
    };
    let segments: Vec<String> = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("%3A", ":"))
        .collect();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let mut store = store.lock().unwrap();

    match (request.method.as_str(), segments.as_slice()) {
        ("POST", []) => create(request, &mut store, opts),
        (_, [id, ..]) if !store.assets.contains_key(*id) => {
            Reply::error("404 Not Found", &format!("asset {id} not found"))
        }
        ("GET", [id]) => {
            let mut asset = store.assets[*id].clone();
            let revision = asset.revision.take();
            Reply::json("200 OK", &serde_json::to_value(&asset).unwrap()).with_etag(revision.as_deref())
        }
        ("DELETE", [id]) => {
            let id = id.to_string();
            store.assets.remove(&id);
            store.blobs.retain(|(asset, _), _| *asset != id);
            Reply::empty("204 No Content")
        }
        ("PUT", [id, "master"]) => put_master(request, &mut store, id),
        ("PUT", [id, "renditions", kind]) => put_rendition(request, &mut store, id, kind),
        ("POST", [id, "renditions:generate"]) => generate(request, &mut store, id),
        ("GET", [id, data @ ..]) => {
            let key = (id.to_string(), data.join("/"));
            let revision = store.assets[*id].revision.clone();
            match store.blobs.get(&key) {
                Some(bytes) => Reply {
                    status: "200 OK",
                    headers: vec!["Content-Type: application/octet-stream".into()],
                    body: bytes.clone(),
                }
                .with_etag(revision.as_deref()),
                None => Reply::error("404 Not Found", &format!("no {} for {id}", key.1)),
            }
        }
        _ => Reply::error("405 Method Not Allowed", "unsupported"),
    }
}

fn record(asset: &AssetRef, body: &[u8]) -> serde_json::Value {
    let mut value = serde_json::to_value(asset).unwrap();
    value["sha256"] = serde_json::Value::String(hex::encode(Sha256::digest(body)));
    value
}

fn create(request: &Request, store: &mut Store, opts: &AssetServerOptions) -> Reply {
    let Some(boundary) = request
        .header("content-type")
        .and_then(|ct| ct.split_once("boundary="))
        .map(|(_, b)| b.trim_matches('"').to_string())
    else {
        return Reply::error("400 Bad Request", "expected multipart body");
    };
    let parts = multipart_parts(&request.body, &boundary);
    let metadata = parts
        .iter()
        .find(|(headers, _)| headers.contains("name=\"metadata\""))
        .and_then(|(_, body)| serde_json::from_slice::<serde_json::Value>(body).ok());
    let file = parts
        .iter()
        .find(|(headers, _)| headers.contains("name=\"file\""))
        .map(|(_, body)| body.clone());
    let (Some(metadata), Some(file)) = (metadata, file) else {
        return Reply::error("400 Bad Request", "metadata and file parts are required");
    };

    store.next_id += 1;
    let id = format!("a{}", store.next_id);
    let name = metadata["name"].as_str().unwrap_or_default();
    let content_type = metadata["content_type"].as_str().unwrap_or_default();
    let mut asset = AssetRef::new(id.as_str(), name, content_type);
    asset.size = file.len() as u64;
    asset.master_data_exists = true;
    asset.revision = Some("r1".into());
    store.assets.insert(id.clone(), asset);
    store.blobs.insert((id.clone(), "master".into()), file.clone());
    for kind in &opts.create_kinds {
        store.add_rendition(&id, *kind);
    }
    Reply::json("201 Created", &record(&store.assets[&id], &file))
}

/// (part headers, part body) for each part of a multipart/form-data body.
fn multipart_parts(body: &[u8], boundary: &str) -> Vec<(String, Vec<u8>)> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut starts = Vec::new();
    let mut i = 0;
    while i + delimiter.len() <= body.len() {
        if &body[i..i + delimiter.len()] == delimiter {
            starts.push(i);
            i += delimiter.len();
        } else {
            i += 1;
        }
    }
    starts
        .windows(2)
        .filter_map(|w| {
            let part = &body[w[0] + delimiter.len()..w[1]];
            let part = part.strip_prefix(b"\r\n").unwrap_or(part);
            let part = part.strip_suffix(b"\r\n").unwrap_or(part);
            let split = part.windows(4).position(|x| x == b"\r\n\r\n")?;
            let headers = String::from_utf8_lossy(&part[..split]).to_string();
            Some((headers, part[split + 4..].to_vec()))
        })
        .collect()
}

fn check_digest(request: &Request) -> Option<Reply> {
    let sent = request.header("x-content-sha256")?;
    let actual = hex::encode(Sha256::digest(&request.body));
    (sent != actual).then(|| Reply::error("400 Bad Request", "digest mismatch"))
}

fn put_master(request: &Request, store: &mut Store, id: &str) -> Reply {
    if let Some(reply) = check_digest(request) {
        return reply;
    }
    store.bump_revision(id);
    let asset = store.assets.get_mut(id).expect("asset exists");
    asset.master_data_exists = true;
    asset.size = request.body.len() as u64;
    if let Some(ct) = request.header("content-type") {
        asset.content_type = ct.to_string();
    }
    let asset = asset.clone();
    store
        .blobs
        .insert((id.to_string(), "master".into()), request.body.clone());
    Reply::json("200 OK", &record(&asset, &request.body))
}

fn put_rendition(request: &Request, store: &mut Store, id: &str, kind: &str) -> Reply {
    let Ok(kind) = kind.parse::<RenditionKind>() else {
        return Reply::error("400 Bad Request", "unknown rendition kind");
    };
    if let Some(reply) = check_digest(request) {
        return reply;
    }
    let asset = store.assets.get_mut(id).expect("asset exists");
    asset.merge_renditions([RenditionDescriptor {
        kind,
        size: request.body.len() as u64,
        available: true,
        metadata: Default::default(),
    }]);
    let asset = asset.clone();
    store
        .blobs
        .insert((id.to_string(), format!("renditions/{kind}")), request.body.clone());
    Reply::json("200 OK", &record(&asset, &request.body))
}

fn generate(request: &Request, store: &mut Store, id: &str) -> Reply {
    let Ok(body) = serde_json::from_slice::<GenerateRenditions>(&request.body) else {
        return Reply::error("400 Bad Request", "malformed generate request");
    };
    let renditions: Vec<RenditionDescriptor> = body
        .kinds
        .iter()
        .map(|kind| store.add_rendition(id, *kind))
        .collect();
    store.generate_requests.push(body);
    Reply::json("200 OK", &serde_json::json!({ "renditions": renditions }))
}
