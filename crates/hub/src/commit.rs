use crate::client::{expect_success, json_error, send, HubClient};
use crate::lfs::sha256_file;
use anyhow::{anyhow, Context, Result};
use async_std::fs::{self, File};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::io::AsyncReadExt;
use hubward_core::manifest::RepoId;
use hubward_core::protocol::TransferEvent;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SAMPLE_SIZE: u64 = 512;
const NDJSON: &str = "application/x-ndjson";

/// How the hub wants a file's bytes delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Inline, base64 encoded in the commit payload
    Regular,
    /// Through LFS storage, referenced by sha256 in the commit payload
    Lfs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub commit_url: String,
    pub oid: String,
    pub message: String,
}

pub fn commit_message(hub_path: &str) -> String {
    format!("Upload model {}", hub_path)
}

#[derive(Serialize)]
struct PreuploadRequest<'a> {
    files: [PreuploadFile<'a>; 1],
}

#[derive(Serialize)]
struct PreuploadFile<'a> {
    path: &'a str,
    sample: String,
    size: u64,
}

#[derive(Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadResult {
    path: String,
    upload_mode: UploadMode,
}

/// One line of the ndjson commit payload.
#[derive(Serialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
enum CommitLine<'a> {
    Header {
        summary: &'a str,
        description: &'a str,
    },
    File {
        content: String,
        path: &'a str,
        encoding: &'static str,
    },
    LfsFile {
        path: &'a str,
        algo: &'static str,
        oid: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    commit_url: String,
    commit_oid: String,
}

/// Quote a revision for use as a single path segment.
fn revision_segment(revision: &str) -> String {
    revision.replace('%', "%25").replace('/', "%2F")
}

impl HubClient {
    /// Upload `local` to `hub_path` in `repo` as a single commit with a single
    /// add operation.
    pub async fn upload_file<F>(
        &self,
        local: &Path,
        hub_path: &str,
        repo: &RepoId,
        revision: &str,
        mut on_event: F,
    ) -> Result<CommitInfo>
    where
        F: FnMut(TransferEvent),
    {
        let size = fs::metadata(local)
            .await
            .with_context(|| format!("Failed to stat {}", local.display()))?
            .len();

        let mode = self.preupload(repo, revision, local, hub_path, size).await?;
        log::info!("Uploading {} as {:?} ({} bytes)", hub_path, mode, size);
        on_event(TransferEvent::Started(hub_path.to_string()));

        let operation = match mode {
            UploadMode::Regular => {
                let bytes = fs::read(local)
                    .await
                    .with_context(|| format!("Failed to read {}", local.display()))?;
                let content = BASE64.encode(bytes);
                on_event(TransferEvent::Progress(size, size));
                CommitLine::File {
                    content,
                    path: hub_path,
                    encoding: "base64",
                }
            }
            UploadMode::Lfs => {
                let oid = sha256_file(local).await?;
                self.upload_lfs(repo, revision, local, &oid, size, &mut on_event)
                    .await?;
                CommitLine::LfsFile {
                    path: hub_path,
                    algo: "sha256",
                    oid,
                }
            }
        };

        let message = commit_message(hub_path);
        let info = self.create_commit(repo, revision, &message, operation).await?;
        on_event(TransferEvent::Complete(info.commit_url.clone()));
        Ok(info)
    }

    /// Ask the hub whether the file goes inline or through LFS.
    pub async fn preupload(
        &self,
        repo: &RepoId,
        revision: &str,
        local: &Path,
        hub_path: &str,
        size: u64,
    ) -> Result<UploadMode> {
        let mut sample = Vec::with_capacity(SAMPLE_SIZE as usize);
        File::open(local)
            .await
            .with_context(|| format!("Failed to open {}", local.display()))?
            .take(SAMPLE_SIZE)
            .read_to_end(&mut sample)
            .await?;

        let url = self.url(&format!(
            "/api/models/{}/preupload/{}",
            repo,
            revision_segment(revision)
        ));
        let request = self
            .authorized(self.http().post(&url))
            .body_json(&PreuploadRequest {
                files: [PreuploadFile {
                    path: hub_path,
                    sample: BASE64.encode(&sample),
                    size,
                }],
            })
            .map_err(|e| anyhow!("Could not encode preupload request: {}", e))?;

        let mut response = expect_success(&url, send(request, &url).await?).await?;
        let body: PreuploadResponse = response
            .body_json()
            .await
            .map_err(|e| json_error(&url, e))?;

        Ok(body
            .files
            .into_iter()
            .find(|file| file.path == hub_path)
            .map(|file| file.upload_mode)
            .unwrap_or(UploadMode::Regular))
    }

    async fn create_commit(
        &self,
        repo: &RepoId,
        revision: &str,
        message: &str,
        operation: CommitLine<'_>,
    ) -> Result<CommitInfo> {
        let header = CommitLine::Header {
            summary: message,
            description: "",
        };
        let payload = [header, operation]
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        let url = self.url(&format!(
            "/api/models/{}/commit/{}",
            repo,
            revision_segment(revision)
        ));
        let request = self
            .authorized(self.http().post(&url))
            .body(payload)
            .header("Content-Type", NDJSON);

        let mut response = expect_success(&url, send(request, &url).await?).await?;
        let body: CommitResponse = response
            .body_json()
            .await
            .map_err(|e| json_error(&url, e))?;

        log::info!("Committed {} to {}", body.commit_oid, repo);
        Ok(CommitInfo {
            commit_url: body.commit_url,
            oid: body.commit_oid,
            message: message.to_string(),
        })
    }
}
