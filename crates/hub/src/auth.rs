use anyhow::Result;
use hubward_core::HubwardError;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Hub access token. Passed explicitly to the client instead of relying on
/// ambient login state.
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("token", &"<redacted>").finish()
    }
}

impl Credentials {
    pub fn new(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(HubwardError::MissingCredentials.into());
        }
        Ok(Self {
            token: token.to_string(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Look for a token in, by priority: `explicit`, `HF_TOKEN`,
    /// `HUGGING_FACE_HUB_TOKEN`, then `$HF_HOME/token`.
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        Self::resolve_from(explicit, |key| std::env::var(key).ok())
    }

    fn resolve_from<E>(explicit: Option<&str>, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let from_file = || {
            let path = hf_home(&env)?.join("token");
            log::debug!("Reading token from {}", path.display());
            fs::read_to_string(path).ok()
        };

        let candidates = explicit
            .map(str::to_string)
            .into_iter()
            .chain(env("HF_TOKEN"))
            .chain(env("HUGGING_FACE_HUB_TOKEN"));

        for candidate in candidates {
            if let Ok(credentials) = Self::new(&candidate) {
                return Ok(credentials);
            }
        }

        match from_file() {
            Some(token) => Self::new(&token),
            None => Err(HubwardError::MissingCredentials.into()),
        }
    }
}

fn hf_home<E>(env: &E) -> Option<PathBuf>
where
    E: Fn(&str) -> Option<String>,
{
    env("HF_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache").join("huggingface")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_token_wins() {
        let env = env_of(&[("HF_TOKEN", "from-env")]);
        let creds = Credentials::resolve_from(Some("explicit"), env).unwrap();
        assert_eq!(creds.token(), "explicit");
    }

    #[test]
    fn env_precedence_and_blank_values() {
        let env = env_of(&[("HF_TOKEN", "  "), ("HUGGING_FACE_HUB_TOKEN", "legacy")]);
        let creds = Credentials::resolve_from(Some(""), env).unwrap();
        assert_eq!(creds.token(), "legacy");
    }

    #[test]
    fn falls_back_to_token_file() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join("token"), "hf_filetoken\n").unwrap();
        let home_str = home.path().to_string_lossy().to_string();

        let creds = Credentials::resolve_from(None, env_of(&[("HF_HOME", home_str.as_str())])).unwrap();
        assert_eq!(creds.token(), "hf_filetoken");
    }

    #[test]
    fn missing_everywhere_is_typed() {
        let home = tempfile::tempdir().unwrap();
        let home_str = home.path().to_string_lossy().to_string();

        let err = Credentials::resolve_from(None, env_of(&[("HF_HOME", home_str.as_str())])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HubwardError>(),
            Some(HubwardError::MissingCredentials)
        ));
    }

    #[test]
    fn debug_output_hides_token() {
        let creds = Credentials::new("hf_secret").unwrap();
        assert!(!format!("{:?}", creds).contains("hf_secret"));
    }
}
