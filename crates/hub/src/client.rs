use crate::auth::Credentials;
use anyhow::{anyhow, Result};
use hubward_core::manifest::{RepoId, DEFAULT_ENDPOINT};
use hubward_core::HubwardError;
use serde::Deserialize;

/// Authenticated handle on a hub endpoint.
pub struct HubClient {
    endpoint: String,
    credentials: Credentials,
    http: surf::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HubClient {
    pub fn new(endpoint: &str, credentials: Credentials) -> Self {
        let endpoint = match endpoint.trim_end_matches('/') {
            "" => DEFAULT_ENDPOINT,
            trimmed => trimmed,
        };
        Self {
            endpoint: endpoint.to_string(),
            credentials,
            http: surf::Client::new(),
        }
    }

    /// Browser URL of a repository.
    pub fn repo_url(&self, repo: &RepoId) -> String {
        format!("{}/{}", self.endpoint, repo)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    pub(crate) fn http(&self) -> &surf::Client {
        &self.http
    }

    pub(crate) fn authorized(&self, builder: surf::RequestBuilder) -> surf::RequestBuilder {
        builder.header(
            "Authorization",
            format!("Bearer {}", self.credentials.token()),
        )
    }
}

/// Send a request, turning transport failures into errors that name the URL.
pub(crate) async fn send(builder: surf::RequestBuilder, url: &str) -> Result<surf::Response> {
    log::debug!("-> {}", url);
    builder
        .await
        .map_err(|e| anyhow!("Request to {} failed: {}", url, e))
}

/// Pass successful responses through, convert everything else to `HubwardError::Remote`.
pub(crate) async fn expect_success(
    url: &str,
    mut response: surf::Response,
) -> Result<surf::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(remote_error(url, &mut response).await.into())
}

pub(crate) async fn remote_error(url: &str, response: &mut surf::Response) -> HubwardError {
    let body = response.body_string().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|parsed| parsed.error)
        .unwrap_or(body);
    HubwardError::Remote {
        status: response.status() as u16,
        url: url.to_string(),
        message,
    }
}

pub(crate) fn json_error(url: &str, e: surf::Error) -> anyhow::Error {
    anyhow!("Unexpected response from {}: {}", url, e)
}
