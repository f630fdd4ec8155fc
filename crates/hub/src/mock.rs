//! In-process stand-in for the hub API plus an artifact origin, for tests.
//!
//! Everything the client sends is recorded so tests can assert on the exact
//! requests a run produced.

use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::net::TcpListener;
use std::sync::{Arc, Mutex, MutexGuard};
use tide::{Request, Response};

pub const MOCK_TOKEN: &str = "hf_mock_token";

/// Which path the hub steers uploads down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockUpload {
    Regular,
    LfsBasic,
    LfsMultipart { chunk_size: u64 },
    /// Multipart with a fixed number of part URLs, whatever the object size
    LfsMultipartParts { chunk_size: u64, parts: u64 },
    /// LFS, but the object is already stored
    LfsPresent,
}

#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Requests to authenticated hub routes, artifact downloads excluded
    pub hub_requests: usize,
    pub create_requests: Vec<Value>,
    pub preupload_requests: Vec<Value>,
    pub batch_requests: Vec<Value>,
    pub basic_uploads: Vec<Vec<u8>>,
    pub parts: Vec<(u32, Vec<u8>)>,
    pub completions: Vec<Value>,
    pub verifications: Vec<Value>,
    /// Parsed ndjson lines of every commit
    pub commits: Vec<Vec<Value>>,
    pub commit_content_types: Vec<String>,
    pub artifact_hits: usize,
}

struct Inner {
    base: String,
    upload: MockUpload,
    repos: HashSet<String>,
    artifacts: HashMap<String, Vec<u8>>,
    recorded: Recorded,
}

#[derive(Clone)]
struct State(Arc<Mutex<Inner>>);

impl State {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct MockHub {
    base: String,
    state: State,
}

impl MockHub {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base = format!("http://{}", listener.local_addr()?);
        let state = State(Arc::new(Mutex::new(Inner {
            base: base.clone(),
            upload: MockUpload::Regular,
            repos: HashSet::new(),
            artifacts: HashMap::new(),
            recorded: Recorded::default(),
        })));

        let mut app = tide::with_state(state.clone());
        app.at("/api/repos/create").post(create_repo);
        app.at("/api/models/:owner/:name/preupload/:rev").post(preupload);
        app.at("/api/models/:owner/:name/commit/:rev").post(commit);
        app.at("/:owner/:repo/info/lfs/objects/batch").post(lfs_batch);
        app.at("/lfs/verify").post(lfs_verify);
        app.at("/s3/basic").put(s3_basic);
        app.at("/s3/part/:number").put(s3_part);
        app.at("/s3/complete").post(s3_complete);
        app.at("/artifacts/:file").get(artifact);

        async_std::task::spawn(app.listen(listener));
        Ok(Self { base, state })
    }

    pub fn endpoint(&self) -> &str {
        &self.base
    }

    pub fn set_upload(&self, upload: MockUpload) {
        self.state.lock().upload = upload;
    }

    /// Pretend `repo_id` was created before the test started.
    pub fn add_repo(&self, repo_id: &str) {
        self.state.lock().repos.insert(repo_id.to_string());
    }

    pub fn add_artifact(&self, file: &str, bytes: &[u8]) {
        self.state
            .lock()
            .artifacts
            .insert(file.to_string(), bytes.to_vec());
    }

    pub fn artifact_url(&self, file: &str) -> String {
        format!("{}/artifacts/{}", self.base, file)
    }

    pub fn recorded(&self) -> Recorded {
        self.state.lock().recorded.clone()
    }
}

fn json_response(status: u16, body: Value) -> Response {
    Response::builder(status).body(body).build()
}

/// Counts the request and rejects it unless it carries the mock token.
fn gate(req: &Request<State>) -> Option<Response> {
    req.state().lock().recorded.hub_requests += 1;
    let expected = format!("Bearer {}", MOCK_TOKEN);
    match req.header("Authorization") {
        Some(value) if value.as_str() == expected => None,
        _ => Some(json_response(
            401,
            json!({"error": "Invalid credentials in Authorization header"}),
        )),
    }
}

async fn create_repo(mut req: Request<State>) -> tide::Result {
    if let Some(denied) = gate(&req) {
        return Ok(denied);
    }
    let body: Value = req.body_json().await?;
    let repo_id = format!(
        "{}/{}",
        body["organization"].as_str().unwrap_or_default(),
        body["name"].as_str().unwrap_or_default()
    );

    let mut inner = req.state().lock();
    inner.recorded.create_requests.push(body);
    if !inner.repos.insert(repo_id.clone()) {
        return Ok(json_response(
            409,
            json!({"error": "You already created this model repo"}),
        ));
    }
    let url = format!("{}/{}", inner.base, repo_id);
    Ok(json_response(200, json!({ "url": url })))
}

async fn preupload(mut req: Request<State>) -> tide::Result {
    if let Some(denied) = gate(&req) {
        return Ok(denied);
    }
    let body: Value = req.body_json().await?;

    let mut inner = req.state().lock();
    let mode = match inner.upload {
        MockUpload::Regular => "regular",
        _ => "lfs",
    };
    let files: Vec<Value> = body["files"]
        .as_array()
        .map(|files| {
            files
                .iter()
                .map(|file| json!({"path": file["path"], "uploadMode": mode, "shouldIgnore": false}))
                .collect()
        })
        .unwrap_or_default();
    inner.recorded.preupload_requests.push(body);
    Ok(json_response(200, json!({ "files": files })))
}

async fn lfs_batch(mut req: Request<State>) -> tide::Result {
    if let Some(denied) = gate(&req) {
        return Ok(denied);
    }
    let body: Value = req.body_json().await?;
    let oid = body["objects"][0]["oid"].clone();
    let size = body["objects"][0]["size"].as_u64().unwrap_or_default();

    let mut inner = req.state().lock();
    let base = inner.base.clone();
    let verify = json!({ "href": format!("{}/lfs/verify", base) });
    let object = match inner.upload {
        MockUpload::Regular | MockUpload::LfsBasic => json!({
            "oid": oid,
            "size": size,
            "actions": {
                "upload": { "href": format!("{}/s3/basic", base) },
                "verify": verify,
            }
        }),
        MockUpload::LfsMultipart { chunk_size }
        | MockUpload::LfsMultipartParts { chunk_size, .. } => {
            let count = match inner.upload {
                MockUpload::LfsMultipartParts { parts, .. } => parts,
                _ => size.div_ceil(chunk_size).max(1),
            };
            let mut header = Map::new();
            header.insert("chunk_size".to_string(), json!(chunk_size.to_string()));
            for part in 1..=count {
                header.insert(
                    format!("{:05}", part),
                    json!(format!("{}/s3/part/{}", base, part)),
                );
            }
            json!({
                "oid": oid,
                "size": size,
                "actions": {
                    "upload": { "href": format!("{}/s3/complete", base), "header": header },
                    "verify": verify,
                }
            })
        }
        MockUpload::LfsPresent => json!({ "oid": oid, "size": size }),
    };
    let transfer = match inner.upload {
        MockUpload::LfsMultipart { .. } | MockUpload::LfsMultipartParts { .. } => "multipart",
        _ => "basic",
    };
    inner.recorded.batch_requests.push(body);
    Ok(json_response(
        200,
        json!({ "transfer": transfer, "objects": [object] }),
    ))
}

async fn lfs_verify(mut req: Request<State>) -> tide::Result {
    if let Some(denied) = gate(&req) {
        return Ok(denied);
    }
    let body: Value = req.body_json().await?;
    req.state().lock().recorded.verifications.push(body);
    Ok(json_response(200, json!({ "success": true })))
}

async fn s3_basic(mut req: Request<State>) -> tide::Result {
    let bytes = req.body_bytes().await?;
    req.state().lock().recorded.basic_uploads.push(bytes);
    Ok(Response::new(200))
}

async fn s3_part(mut req: Request<State>) -> tide::Result {
    let number: u32 = req.param("number")?.parse()?;
    let bytes = req.body_bytes().await?;
    req.state().lock().recorded.parts.push((number, bytes));
    Ok(Response::builder(200)
        .header("ETag", format!("\"etag-{}\"", number))
        .build())
}

async fn s3_complete(mut req: Request<State>) -> tide::Result {
    let body: Value = req.body_json().await?;
    req.state().lock().recorded.completions.push(body);
    Ok(json_response(200, json!({})))
}

async fn commit(mut req: Request<State>) -> tide::Result {
    if let Some(denied) = gate(&req) {
        return Ok(denied);
    }
    let content_type = req
        .header("Content-Type")
        .map(|value| value.as_str().to_string())
        .unwrap_or_default();
    let repo_id = format!("{}/{}", req.param("owner")?, req.param("name")?);
    let text = req.body_string().await?;
    let lines = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<Value>(line))
        .collect::<Result<Vec<Value>, _>>()?;

    let mut inner = req.state().lock();
    inner.recorded.commits.push(lines);
    inner.recorded.commit_content_types.push(content_type);
    let oid = format!("{:040x}", inner.recorded.commits.len());
    let commit_url = format!("{}/{}/commit/{}", inner.base, repo_id, oid);
    Ok(json_response(
        200,
        json!({ "commitUrl": commit_url, "commitOid": oid }),
    ))
}

async fn artifact(req: Request<State>) -> tide::Result {
    let file = req.param("file")?.to_string();
    let mut inner = req.state().lock();
    inner.recorded.artifact_hits += 1;
    match inner.artifacts.get(&file) {
        Some(bytes) => Ok(Response::builder(200).body(bytes.clone()).build()),
        None => Ok(Response::builder(404).body("not found").build()),
    }
}
