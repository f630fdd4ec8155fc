use anyhow::{Context, Result};
use hubward_core::manifest::PublishConfig;
use hubward_core::HubwardError;
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "hubward.toml";

/// Values supplied on the command line, highest priority.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub repo_id: Option<String>,
    pub model: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub hub_path: Option<String>,
    pub endpoint: Option<String>,
    pub revision: Option<String>,
    pub private: Option<bool>,
    pub catalog: Option<PathBuf>,
}

/// Build the run configuration: defaults, then the config file, then the
/// environment, then `overrides`.
pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<PublishConfig> {
    load_with(config_path, Path::new(CONFIG_FILE), overrides, |key| {
        std::env::var(key).ok()
    })
}

fn load_with<E>(
    config_path: Option<&Path>,
    fallback: &Path,
    overrides: &Overrides,
    env: E,
) -> Result<PublishConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let mut config = match config_path {
        Some(path) => read_file(path)?,
        None if fallback.is_file() => read_file(fallback)?,
        None => PublishConfig::default(),
    };

    if let Some(repo_id) = env("HUBWARD_REPO_ID") {
        config.repo_id = repo_id.parse()?;
    }
    if let Some(model) = env("HUBWARD_MODEL") {
        config.model = model;
    }
    if let Some(dir) = env("HUBWARD_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(hub_path) = env("HUBWARD_HUB_PATH") {
        config.hub_path = hub_path;
    }
    if let Some(endpoint) = env("HF_ENDPOINT") {
        config.endpoint = endpoint;
    }

    apply(&mut config, overrides)?;
    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn apply(config: &mut PublishConfig, overrides: &Overrides) -> Result<()> {
    if let Some(repo_id) = &overrides.repo_id {
        config.repo_id = repo_id.parse()?;
    }
    if let Some(model) = &overrides.model {
        config.model = model.clone();
    }
    if let Some(dir) = &overrides.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(hub_path) = &overrides.hub_path {
        config.hub_path = hub_path.clone();
    }
    if let Some(endpoint) = &overrides.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(revision) = &overrides.revision {
        config.revision = revision.clone();
    }
    if let Some(private) = overrides.private {
        config.private = private;
    }
    if let Some(catalog) = &overrides.catalog {
        config.catalog = Some(catalog.clone());
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<PublishConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read config {}", path.display()))?;
    toml::from_str(&content)
        .map_err(|e| HubwardError::Config(format!("{}: {}", path.display(), e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn missing() -> PathBuf {
        PathBuf::from("/nonexistent/hubward.toml")
    }

    #[test]
    fn defaults_without_file_env_or_flags() {
        let config = load_with(None, &missing(), &Overrides::default(), no_env).unwrap();
        assert_eq!(config.repo_id.to_string(), "jerpint/whisper");
        assert_eq!(config.model, "small");
        assert_eq!(config.output_dir, PathBuf::from("models/"));
    }

    #[test]
    fn layers_apply_in_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hubward.toml");
        fs::write(
            &file,
            r#"
            repo_id = "file/repo"
            model = "tiny"
            revision = "dev"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [("HUBWARD_MODEL", "base"), ("HF_ENDPOINT", "http://env")]
            .into_iter()
            .collect();
        let overrides = Overrides {
            model: Some("medium".to_string()),
            private: Some(true),
            ..Default::default()
        };

        let config = load_with(None, &file, &overrides, |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.repo_id.to_string(), "file/repo");
        assert_eq!(config.revision, "dev");
        assert_eq!(config.endpoint, "http://env");
        assert_eq!(config.model, "medium");
        assert!(config.private);
    }

    #[test]
    fn explicit_config_must_exist() {
        let result = load_with(
            Some(&missing()),
            &missing(),
            &Overrides::default(),
            no_env,
        );
        assert!(result.is_err());
    }

    #[test]
    fn invalid_repo_override_is_rejected() {
        let overrides = Overrides {
            repo_id: Some("no-owner".to_string()),
            ..Default::default()
        };
        let err = load_with(None, &missing(), &overrides, no_env).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HubwardError>(),
            Some(HubwardError::InvalidRepoId(_))
        ));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.toml");
        fs::write(&file, "private = \"maybe\"").unwrap();

        let err = load_with(Some(&file), &missing(), &Overrides::default(), no_env).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HubwardError>(),
            Some(HubwardError::Config(_))
        ));
    }
}
