use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::host::DEFAULT_USER_AGENT;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_DOCS_ROOT: &str = "docs";
pub const DEFAULT_LANDING_TITLE: &str = "Home";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiPubConfig {
    #[serde(default)]
    pub docs: DocsSection,
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct DocsSection {
    pub root: Option<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    /// Git URL of the wiki repository (clone/push target).
    pub repository_url: Option<String>,
    /// REST endpoint for the existence check and bootstrap.
    pub api_url: Option<String>,
    pub branch: Option<String>,
    pub user_agent: Option<String>,
    pub landing_page_title: Option<String>,
}

impl WikiPubConfig {
    /// Resolve the docs root: env WIKIPUB_DOCS_ROOT > config > default.
    pub fn docs_root(&self) -> String {
        if let Some(value) = non_empty_env("WIKIPUB_DOCS_ROOT") {
            return value;
        }
        self.docs
            .root
            .clone()
            .unwrap_or_else(|| DEFAULT_DOCS_ROOT.to_string())
    }

    /// Resolve the wiki repository URL: env WIKIPUB_REPO_URL > config.
    pub fn repository_url(&self) -> Result<String> {
        if let Some(value) = non_empty_env("WIKIPUB_REPO_URL") {
            return Ok(value);
        }
        self.wiki.repository_url.clone().ok_or_else(|| {
            SyncError::Config(
                "wiki repository URL is not configured (set [wiki].repository_url or WIKIPUB_REPO_URL)"
                    .to_string(),
            )
        })
    }

    /// Resolve the platform API URL: env WIKIPUB_API_URL > config.
    pub fn api_url(&self) -> Result<String> {
        if let Some(value) = non_empty_env("WIKIPUB_API_URL") {
            return Ok(value);
        }
        self.wiki.api_url.clone().ok_or_else(|| {
            SyncError::Config(
                "wiki API URL is not configured (set [wiki].api_url or WIKIPUB_API_URL)".to_string(),
            )
        })
    }

    pub fn branch(&self) -> &str {
        self.wiki.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    pub fn user_agent(&self) -> &str {
        self.wiki.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn landing_page_title(&self) -> &str {
        self.wiki
            .landing_page_title
            .as_deref()
            .unwrap_or(DEFAULT_LANDING_TITLE)
    }
}

/// Load a config from a TOML file. Returns the default when the file does
/// not exist.
pub fn load_config(config_path: &Path) -> Result<WikiPubConfig> {
    if !config_path.exists() {
        return Ok(WikiPubConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .map_err(|error| SyncError::filesystem(config_path, error))?;
    toml::from_str(&content).map_err(|error| {
        SyncError::Config(format!(
            "failed to parse {}: {error}",
            config_path.display()
        ))
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{WikiPubConfig, load_config};
    use crate::error::SyncError;

    #[test]
    fn defaults_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/wikipub.toml")).expect("load");
        assert_eq!(config.docs_root(), "docs");
        assert_eq!(config.branch(), "main");
        assert_eq!(config.landing_page_title(), "Home");
        assert!(config.repository_url().is_err());
    }

    #[test]
    fn parses_full_config() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("wikipub.toml");
        fs::write(
            &path,
            r#"
[docs]
root = "handbook"
ignore = ["drafts/**", "**/README.md"]

[wiki]
repository_url = "https://example.org/project.wiki.git"
api_url = "https://example.org/api/wikis/project"
branch = "master"
user_agent = "docs-bot/1.0"
landing_page_title = "Welcome"
"#,
        )
        .expect("write config");

        let config = load_config(&path).expect("load");
        assert_eq!(config.docs_root(), "handbook");
        assert_eq!(config.docs.ignore.len(), 2);
        assert_eq!(
            config.repository_url().expect("url"),
            "https://example.org/project.wiki.git"
        );
        assert_eq!(config.branch(), "master");
        assert_eq!(config.user_agent(), "docs-bot/1.0");
        assert_eq!(config.landing_page_title(), "Welcome");
    }

    #[test]
    fn tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("wikipub.toml");
        fs::write(&path, "[docs]\nroot = \"notes\"\n").expect("write config");

        let config = load_config(&path).expect("load");
        assert_eq!(config.docs_root(), "notes");
        assert!(config.wiki.repository_url.is_none());
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("wikipub.toml");
        fs::write(&path, "[wiki\nrepository_url = \"oops\"").expect("write config");
        let error = load_config(&path).expect_err("must fail");
        assert!(matches!(error, SyncError::Config(_)));
    }

    #[test]
    fn missing_api_url_is_a_config_error() {
        let config = WikiPubConfig::default();
        let error = config.api_url().expect_err("must fail");
        assert!(error.to_string().contains("api_url"));
    }
}
