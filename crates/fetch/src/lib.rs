//! # hubward-fetch
//!
//! **Model catalog lookups and streaming checkpoint downloads.**
//!
//! A [`ModelCatalog`] maps a model descriptor (e.g. `small`) to the URL of its
//! checkpoint. The built-in [`StaticCatalog`] carries the upstream whisper
//! checkpoints and can be extended from a TOML file; any other implementation of
//! the trait can be injected instead.
//!
//! [`ModelFetcher`] validates a descriptor against the catalog, then streams the
//! checkpoint to `<output_dir>/<descriptor>.<ext>` without holding it in memory.
//!
//! ```no_run
//! use hubward_fetch::{ModelFetcher, StaticCatalog};
//! use std::path::Path;
//!
//! #[async_std::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = ModelFetcher::new(StaticCatalog::new()?);
//!     let path = fetcher.fetch("small", Path::new("models/"), |_| {}).await?;
//!     println!("Model available at: {:?}", path);
//!     Ok(())
//! }
//! ```

/// Descriptor to URL lookup.
pub mod catalog;

/// Validation and download of checkpoints.
pub mod fetcher;

mod redirect;

pub use catalog::{CatalogEntry, ModelCatalog, StaticCatalog};
pub use fetcher::ModelFetcher;
