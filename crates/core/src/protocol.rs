use crate::manifest::RepoId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    /// A download or upload of the named file is starting
    Started(String),
    /// Progress in bytes (current, total). Total is 0 when unknown.
    Progress(u64, u64),
    /// Transfer finished, carries the local path or destination
    Complete(String),
}

/// Progress of a publish run, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// The destination repository is being created or reused
    Initializing(RepoId),
    /// The checkpoint download is about to start
    Downloading { file: String, url: String },
    /// The downloaded checkpoint is about to be committed
    Uploading {
        local: PathBuf,
        hub_path: String,
        repo_id: RepoId,
    },
    Download(TransferEvent),
    Upload(TransferEvent),
}
