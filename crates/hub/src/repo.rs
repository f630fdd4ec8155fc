use crate::client::{expect_success, send, HubClient};
use anyhow::{anyhow, Result};
use hubward_core::manifest::RepoId;
use serde::{Deserialize, Serialize};
use std::fmt;
use surf::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrl(String);

impl RepoUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    organization: &'a str,
    private: bool,
}

#[derive(Deserialize)]
struct CreateRepoResponse {
    url: Option<String>,
}

impl HubClient {
    /// Create the model repository, or reuse it when it already exists.
    ///
    /// The hub answers `409 Conflict` for an existing repository; that is treated
    /// as success so repeated runs resolve to the same URL.
    pub async fn ensure_repo(&self, repo: &RepoId, private: bool) -> Result<RepoUrl> {
        let url = self.url("/api/repos/create");
        let request = self
            .authorized(self.http().post(&url))
            .body_json(&CreateRepoRequest {
                name: repo.name(),
                organization: repo.owner(),
                private,
            })
            .map_err(|e| anyhow!("Could not encode create request: {}", e))?;

        let response = send(request, &url).await?;
        if response.status() == StatusCode::Conflict {
            log::info!("Repository {} already exists", repo);
            return Ok(RepoUrl(self.repo_url(repo)));
        }

        let mut response = expect_success(&url, response).await?;
        let created = response
            .body_json::<CreateRepoResponse>()
            .await
            .ok()
            .and_then(|body| body.url);

        log::info!("Created repository {}", repo);
        Ok(RepoUrl(created.unwrap_or_else(|| self.repo_url(repo))))
    }
}
