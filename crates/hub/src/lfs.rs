//! Git LFS batch upload, as the hub expects for large binaries.

use crate::client::{expect_success, json_error, send, HubClient};
use anyhow::{anyhow, bail, Context, Result};
use async_std::fs::File;
use async_std::io::BufReader;
use futures::io::AsyncReadExt;
use hubward_core::manifest::RepoId;
use hubward_core::protocol::TransferEvent;
use hubward_core::HubwardError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
const HASH_CHUNK: usize = 1024 * 1024;
/// Largest part object storage accepts in a multipart upload (5 GiB).
const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Serialize)]
struct BatchRequest<'a> {
    operation: &'static str,
    transfers: [&'static str; 2],
    objects: [LfsObject<'a>; 1],
    hash_algo: &'static str,
    #[serde(rename = "ref")]
    reference: RefSpec<'a>,
}

#[derive(Serialize)]
struct LfsObject<'a> {
    oid: &'a str,
    size: u64,
}

#[derive(Serialize)]
struct RefSpec<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    transfer: Option<String>,
    objects: Vec<BatchObject>,
}

#[derive(Deserialize)]
struct BatchObject {
    #[serde(default)]
    actions: Option<Actions>,
    #[serde(default)]
    error: Option<ObjectError>,
}

#[derive(Deserialize)]
struct Actions {
    upload: Option<Action>,
    verify: Option<Action>,
}

#[derive(Deserialize)]
struct Action {
    href: String,
    #[serde(default)]
    header: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct ObjectError {
    code: u16,
    message: String,
}

#[derive(Serialize)]
struct CompletePart {
    #[serde(rename = "partNumber")]
    part_number: usize,
    etag: String,
}

#[derive(Serialize)]
struct CompleteMultipart<'a> {
    oid: &'a str,
    parts: Vec<CompletePart>,
}

/// Hex sha256 of a file, the LFS object id.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

impl HubClient {
    /// Push one object to LFS storage. Objects the hub already holds are skipped.
    pub(crate) async fn upload_lfs<F>(
        &self,
        repo: &RepoId,
        revision: &str,
        local: &Path,
        oid: &str,
        size: u64,
        on_event: &mut F,
    ) -> Result<()>
    where
        F: FnMut(TransferEvent),
    {
        let url = self.url(&format!("/{}.git/info/lfs/objects/batch", repo));
        let request = self
            .authorized(self.http().post(&url))
            .body_json(&BatchRequest {
                operation: "upload",
                transfers: ["basic", "multipart"],
                objects: [LfsObject { oid, size }],
                hash_algo: "sha256",
                reference: RefSpec { name: revision },
            })
            .map_err(|e| anyhow!("Could not encode LFS batch request: {}", e))?
            .header("Content-Type", LFS_MEDIA_TYPE)
            .header("Accept", LFS_MEDIA_TYPE);

        let mut response = expect_success(&url, send(request, &url).await?).await?;
        let batch: BatchResponse = response
            .body_json()
            .await
            .map_err(|e| json_error(&url, e))?;

        let object = batch
            .objects
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("LFS batch response from {} has no objects", url))?;

        if let Some(error) = object.error {
            return Err(HubwardError::Remote {
                status: error.code,
                url,
                message: error.message,
            }
            .into());
        }

        let (upload, verify) = match object.actions {
            Some(Actions {
                upload: Some(upload),
                verify,
            }) => (upload, verify),
            _ => {
                log::info!("LFS object {} already present, skipping upload", oid);
                return Ok(());
            }
        };

        let transfer = batch.transfer.as_deref().unwrap_or("basic");
        log::debug!("LFS transfer '{}' for {}", transfer, oid);
        match transfer {
            "basic" => self.upload_basic(&upload, local, size, on_event).await?,
            "multipart" => self.upload_multipart(&upload, local, oid, size, on_event).await?,
            other => bail!("Unsupported LFS transfer '{}'", other),
        }

        if let Some(verify) = verify {
            let request = self
                .authorized(self.http().post(&verify.href))
                .body_json(&LfsObject { oid, size })
                .map_err(|e| anyhow!("Could not encode LFS verify request: {}", e))?;
            expect_success(&verify.href, send(request, &verify.href).await?).await?;
        }
        Ok(())
    }

    async fn upload_basic<F>(
        &self,
        upload: &Action,
        local: &Path,
        size: u64,
        on_event: &mut F,
    ) -> Result<()>
    where
        F: FnMut(TransferEvent),
    {
        let file = File::open(local)
            .await
            .with_context(|| format!("Failed to open {}", local.display()))?;
        let body = surf::Body::from_reader(BufReader::new(file), Some(size as usize));

        on_event(TransferEvent::Progress(0, size));
        let request = self.http().put(&upload.href).body(body);
        expect_success(&upload.href, send(request, &upload.href).await?).await?;
        on_event(TransferEvent::Progress(size, size));
        Ok(())
    }

    async fn upload_multipart<F>(
        &self,
        upload: &Action,
        local: &Path,
        oid: &str,
        size: u64,
        on_event: &mut F,
    ) -> Result<()>
    where
        F: FnMut(TransferEvent),
    {
        let chunk_size = header_chunk_size(&upload.header)?;
        let part_urls = sorted_part_urls(&upload.header);
        let expected = size.div_ceil(chunk_size).max(1) as usize;
        if part_urls.len() != expected {
            bail!(
                "LFS multipart upload expects {} parts of {} bytes, hub sent {} URLs",
                expected,
                chunk_size,
                part_urls.len()
            );
        }

        let mut file = File::open(local)
            .await
            .with_context(|| format!("Failed to open {}", local.display()))?;
        let mut parts = Vec::with_capacity(part_urls.len());
        let mut sent = 0u64;
        on_event(TransferEvent::Progress(0, size));

        for (index, part_url) in part_urls.iter().enumerate() {
            let mut chunk = Vec::with_capacity(chunk_size.min(size.saturating_sub(sent)) as usize);
            (&mut file).take(chunk_size).read_to_end(&mut chunk).await?;
            sent += chunk.len() as u64;

            let request = self.http().put(part_url).body(chunk);
            let response = expect_success(part_url, send(request, part_url).await?).await?;
            let etag = response
                .header("ETag")
                .map(|values| values.last().as_str().to_string())
                .ok_or_else(|| anyhow!("Part {} upload returned no ETag", index + 1))?;

            parts.push(CompletePart {
                part_number: index + 1,
                etag,
            });
            on_event(TransferEvent::Progress(sent, size));
        }

        let request = self
            .http()
            .post(&upload.href)
            .body_json(&CompleteMultipart { oid, parts })
            .map_err(|e| anyhow!("Could not encode multipart completion: {}", e))?
            .header("Content-Type", LFS_MEDIA_TYPE)
            .header("Accept", LFS_MEDIA_TYPE);
        expect_success(&upload.href, send(request, &upload.href).await?).await?;
        Ok(())
    }
}

fn header_chunk_size(header: &HashMap<String, Value>) -> Result<u64> {
    let value = header
        .get("chunk_size")
        .ok_or_else(|| anyhow!("LFS multipart upload is missing chunk_size"))?;
    let size = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    match size {
        Some(size) if size > 0 && size <= MAX_PART_SIZE => Ok(size),
        _ => bail!("Invalid LFS chunk_size {}", value),
    }
}

/// Part URLs keyed by five-digit part numbers, in part order.
fn sorted_part_urls(header: &HashMap<String, Value>) -> Vec<String> {
    let mut parts: Vec<(u32, String)> = header
        .iter()
        .filter(|(key, _)| key.len() == 5 && key.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|(key, value)| Some((key.parse().ok()?, value.as_str()?.to_string())))
        .collect();
    parts.sort_by_key(|(number, _)| *number);
    parts.into_iter().map(|(_, url)| url).collect()
}
