use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Overrides `api.base_url` when set.
pub const API_URL_ENV: &str = "TARIFFBOARD_API_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_settle_delay_secs() -> u64 {
    5
}

fn default_page_size() -> usize {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RefreshConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Wait between a successful update trigger and the re-fetch that picks
    /// up its results.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            poll_interval_secs: default_poll_interval_secs(),
            settle_delay_secs: default_settle_delay_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ViewConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

impl AppConfig {
    /// Loads the config at the default location. A missing file means
    /// defaults.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "tariffboard", "tariffboard")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Applies the value of [`API_URL_ENV`], if any.
    pub fn with_env_overrides(self) -> Self {
        self.apply_env_override(std::env::var(API_URL_ENV).ok())
    }

    pub fn apply_env_override(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.map(|u| u.trim().to_string())
            && !url.is_empty()
        {
            debug!(%url, "Base URL overridden from environment");
            self.api.base_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
api:
  base_url: "https://tariffs.example.org"
  timeout_secs: 10
refresh:
  poll_interval_secs: 60
view:
  page_size: 25
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.api.base_url, "https://tariffs.example.org");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.refresh.settle_delay(), Duration::from_secs(5));
        assert_eq!(config.view.page_size, 25);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.refresh.poll_interval_secs, 300);
        assert_eq!(config.view.page_size, 10);
    }

    #[test]
    fn test_env_override() {
        let config = AppConfig::default()
            .apply_env_override(Some(" http://api.internal:9000 ".to_string()));
        assert_eq!(config.api.base_url, "http://api.internal:9000");

        let config = AppConfig::default().apply_env_override(Some(String::new()));
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);

        let config = AppConfig::default().apply_env_override(None);
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_load_from_path() -> Result<()> {
        let file = NamedTempFile::new()?;
        fs::write(file.path(), "refresh:\n  settle_delay_secs: 0\n")?;

        let config = AppConfig::load_from_path(file.path())?;
        assert_eq!(config.refresh.settle_delay(), Duration::ZERO);
        assert_eq!(config.api, ApiConfig::default());

        fs::write(file.path(), "api: [not, a, map]\n")?;
        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load_from_path("/nonexistent/tariffboard.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
