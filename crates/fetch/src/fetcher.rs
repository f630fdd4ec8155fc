use crate::catalog::ModelCatalog;
use crate::redirect::RedirectMiddleware;
use anyhow::{anyhow, Context, Result};
use async_std::fs::{self, File};
use futures::io::{AsyncReadExt, AsyncWriteExt};
use hubward_core::protocol::TransferEvent;
use hubward_core::HubwardError;
use std::path::{Path, PathBuf};

const MAX_REDIRECTS: u8 = 5;
const CHUNK_SIZE: usize = 64 * 1024;

/// Resolves model descriptors through a catalog and downloads their checkpoints.
pub struct ModelFetcher<C: ModelCatalog> {
    catalog: C,
    client: surf::Client,
}

impl<C: ModelCatalog> ModelFetcher<C> {
    pub fn new(catalog: C) -> Self {
        let client = surf::Client::new().with(RedirectMiddleware::new(MAX_REDIRECTS));
        Self { catalog, client }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Check the descriptor against the catalog and return its source URL.
    /// Performs no I/O, so an unknown name never reaches the filesystem or network.
    pub fn validate(&self, name: &str) -> Result<String> {
        self.catalog.resolve(name).ok_or_else(|| {
            HubwardError::UnknownModel {
                name: name.to_string(),
                known: self.catalog.names(),
            }
            .into()
        })
    }

    /// `<name>.<ext>`
    pub fn target_file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.catalog.extension())
    }

    /// `<output_dir>/<name>.<ext>`
    pub fn target_path(&self, output_dir: &Path, name: &str) -> PathBuf {
        output_dir.join(self.target_file_name(name))
    }

    /// Download the checkpoint for `name` into `output_dir` and return its local path.
    ///
    /// The directory is created if missing (one level only). An existing file at the
    /// target path is overwritten.
    pub async fn fetch<F>(&self, name: &str, output_dir: &Path, mut on_event: F) -> Result<PathBuf>
    where
        F: FnMut(TransferEvent),
    {
        let url = self.validate(name)?;

        if !output_dir.is_dir() {
            fs::create_dir(output_dir)
                .await
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        }

        let path = self.target_path(output_dir, name);
        self.download(&url, &path, &mut on_event).await?;
        Ok(path)
    }

    async fn download<F>(&self, url: &str, path: &Path, on_event: &mut F) -> Result<()>
    where
        F: FnMut(TransferEvent),
    {
        log::info!("GET {}", url);
        let mut response = self
            .client
            .get(url)
            .await
            .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.body_string().await.unwrap_or_default();
            return Err(HubwardError::Remote {
                status: status as u16,
                url: url.to_string(),
                message,
            }
            .into());
        }

        let total = response.len().unwrap_or(0) as u64;
        let mut file = File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        on_event(TransferEvent::Started(label));

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = response
                .read(&mut buf)
                .await
                .map_err(|e| anyhow!("Streaming failed: {}", e))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            written += n as u64;
            on_event(TransferEvent::Progress(written, total));
        }
        file.flush().await?;

        log::debug!("Wrote {} bytes to {}", written, path.display());
        on_event(TransferEvent::Complete(path.display().to_string()));
        Ok(())
    }
}
