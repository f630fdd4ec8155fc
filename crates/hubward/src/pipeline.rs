use anyhow::Result;
use hubward_core::manifest::PublishConfig;
use hubward_core::protocol::PipelineEvent;
use hubward_fetch::{ModelCatalog, ModelFetcher};
use hubward_hub::{CommitInfo, Credentials, HubClient, RepoUrl};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub repo_url: RepoUrl,
    pub local_path: PathBuf,
    pub hub_path: String,
    pub commit: CommitInfo,
}

/// Provision, fetch, publish. The three steps run one after the other and
/// only hand plain values to each other.
pub struct Pipeline<C: ModelCatalog> {
    config: PublishConfig,
    fetcher: ModelFetcher<C>,
    hub: HubClient,
}

impl<C: ModelCatalog> Pipeline<C> {
    pub fn new(config: PublishConfig, credentials: Credentials, catalog: C) -> Self {
        let hub = HubClient::new(&config.endpoint, credentials);
        Self {
            config,
            fetcher: ModelFetcher::new(catalog),
            hub,
        }
    }

    /// Destination path of the checkpoint inside the repository.
    pub fn hub_path(&self) -> Result<String> {
        Ok(self
            .config
            .render_hub_path(self.fetcher.catalog().extension())?)
    }

    pub async fn run<F>(&self, mut on_event: F) -> Result<PublishReport>
    where
        F: FnMut(PipelineEvent),
    {
        let config = &self.config;

        // Unknown models and bad templates fail before anything remote happens.
        let url = self.fetcher.validate(&config.model)?;
        let hub_path = self.hub_path()?;

        on_event(PipelineEvent::Initializing(config.repo_id.clone()));
        let repo_url = self.hub.ensure_repo(&config.repo_id, config.private).await?;

        on_event(PipelineEvent::Downloading {
            file: self.fetcher.target_file_name(&config.model),
            url,
        });
        let local_path = self
            .fetcher
            .fetch(&config.model, &config.output_dir, |event| {
                on_event(PipelineEvent::Download(event))
            })
            .await?;

        on_event(PipelineEvent::Uploading {
            local: local_path.clone(),
            hub_path: hub_path.clone(),
            repo_id: config.repo_id.clone(),
        });
        let commit = self
            .hub
            .upload_file(
                &local_path,
                &hub_path,
                &config.repo_id,
                &config.revision,
                |event| on_event(PipelineEvent::Upload(event)),
            )
            .await?;

        Ok(PublishReport {
            repo_url,
            local_path,
            hub_path,
            commit,
        })
    }
}
