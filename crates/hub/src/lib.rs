//! # hubward-hub
//!
//! Client for the model hub's HTTP API, covering the two remote steps of a
//! publish run:
//!
//! - [`HubClient::ensure_repo`] creates a model repository, or reuses it if it
//!   already exists.
//! - [`HubClient::upload_file`] commits one local file to one path in the
//!   repository. Small files travel inline in the commit; large binaries go through
//!   git LFS (basic or multipart transfer) first.
//!
//! Credentials are explicit: build a [`Credentials`] (usually via
//! [`Credentials::resolve`]) and hand it to [`HubClient::new`].

pub mod auth;
pub mod client;
pub mod commit;
pub mod lfs;
pub mod repo;

#[cfg(feature = "mock")]
pub mod mock;

pub use auth::Credentials;
pub use client::HubClient;
pub use commit::{commit_message, CommitInfo, UploadMode};
pub use repo::RepoUrl;
