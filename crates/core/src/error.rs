use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubwardError {
    /// The requested model is not part of the catalog. Raised before any I/O.
    #[error("Unknown model '{name}'. Model can be one of {known:?}")]
    UnknownModel { name: String, known: Vec<String> },

    #[error("Invalid repository id '{0}', expected <owner>/<name>")]
    InvalidRepoId(String),

    #[error("No hub token found. Set HF_TOKEN or log in with huggingface-cli")]
    MissingCredentials,

    /// Non-success response from the hub or the artifact source.
    #[error("{url} returned {status}: {message}")]
    Remote {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}
