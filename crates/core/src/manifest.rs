use crate::HubwardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_REVISION: &str = "main";

/// `<owner>/<name>` identifier of a hub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoId {
    type Err = HubwardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HubwardError::InvalidRepoId(s.to_string());
        let (owner, name) = s.split_once('/').ok_or_else(invalid)?;

        let valid_part = |part: &str| !part.is_empty() && !part.contains('/') && part.trim() == part;
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl TryFrom<String> for RepoId {
    type Error = HubwardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Everything a publish run needs apart from credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub repo_id: RepoId,
    pub model: String,
    pub output_dir: PathBuf,
    /// Destination inside the repository. `{model}` and `{ext}` are substituted.
    pub hub_path: String,
    pub endpoint: String,
    pub revision: String,
    pub private: bool,
    /// Extra catalog entries layered over the built-in table.
    pub catalog: Option<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            repo_id: RepoId {
                owner: "jerpint".to_string(),
                name: "whisper".to_string(),
            },
            model: "small".to_string(),
            output_dir: PathBuf::from("models/"),
            hub_path: "{model}.{ext}".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            private: false,
            catalog: None,
        }
    }
}

impl PublishConfig {
    /// Expand the `hub_path` template for the configured model.
    pub fn render_hub_path(&self, ext: &str) -> Result<String, HubwardError> {
        let template = &self.hub_path;
        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                HubwardError::Config(format!("Unclosed placeholder in hub_path '{}'", template))
            })?;

            match &after[..end] {
                "model" => out.push_str(&self.model),
                "ext" => out.push_str(ext),
                other => {
                    return Err(HubwardError::Config(format!(
                        "Unknown placeholder '{{{}}}' in hub_path '{}'",
                        other, template
                    )))
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);

        if out.is_empty() {
            return Err(HubwardError::Config("hub_path must not be empty".to_string()));
        }
        Ok(out)
    }
}
