//! # hubward
//!
//! Publishes a pre-trained whisper checkpoint to a model hub repository in three
//! steps: ensure the repository exists, download the checkpoint, commit it.
//!
//! ```no_run
//! use hubward::{config, load_catalog, Pipeline};
//! use hubward::hub::Credentials;
//!
//! #[async_std::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load(None, &config::Overrides::default())?;
//!     let catalog = load_catalog(&config)?;
//!     let pipeline = Pipeline::new(config, Credentials::resolve(None)?, catalog);
//!
//!     let report = pipeline.run(|event| println!("{:?}", event)).await?;
//!     println!("Committed {}", report.commit.commit_url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pipeline;

pub use hubward_core as core;
pub use hubward_fetch as fetch;
pub use hubward_hub as hub;

pub use pipeline::{Pipeline, PublishReport};

use anyhow::Result;
use hubward_core::manifest::PublishConfig;
use hubward_fetch::{ModelFetcher, StaticCatalog};
use hubward_hub::Credentials;

/// The built-in catalog, extended by the configured catalog file if any.
pub fn load_catalog(config: &PublishConfig) -> Result<StaticCatalog> {
    let catalog = StaticCatalog::new()?;
    match &config.catalog {
        Some(path) => catalog.with_overrides(path),
        None => Ok(catalog),
    }
}

/// Load the catalog, check the model against it, then resolve credentials.
/// An unknown model is reported before any token lookup.
pub fn build_pipeline(config: PublishConfig, token: Option<&str>) -> Result<Pipeline<StaticCatalog>> {
    build_pipeline_with(config, || Credentials::resolve(token))
}

fn build_pipeline_with<R>(config: PublishConfig, resolve: R) -> Result<Pipeline<StaticCatalog>>
where
    R: FnOnce() -> Result<Credentials>,
{
    let catalog = load_catalog(&config)?;
    ModelFetcher::new(catalog.clone()).validate(&config.model)?;
    let credentials = resolve()?;
    Ok(Pipeline::new(config, credentials, catalog))
}
