//! Configuration loading
//!
//! Settings live in a TOML file under the platform config directory. Every
//! field has a default so a missing file still yields a usable client
//! against the public API.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.mercadolibre.com";
const DEFAULT_AUTH_URL: &str = "https://auth.mercadolivre.com.br/authorization";

/// Application settings, read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OAuth2 application id
    pub client_id: String,
    /// OAuth2 application secret
    pub client_secret: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
    /// REST API base, also hosts `/oauth/token`
    pub api_url: String,
    /// Browser authorization page
    pub auth_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum calls per rolling minute for one client
    pub rate_limit: u32,
    /// Where the token record is persisted (JSON)
    pub token_file: PathBuf,
    /// Used when no token file exists yet
    pub fallback_access_token: String,
    pub fallback_refresh_token: String,
    /// ISO-8601 timestamp, taken verbatim into the fallback token
    pub fallback_expires_at: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "https://localhost/callback".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            timeout_secs: 30,
            rate_limit: 1000,
            token_file: default_token_file(),
            fallback_access_token: String::new(),
            fallback_refresh_token: String::new(),
            fallback_expires_at: "1970-01-01T00:00:00".to_string(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "meli-etl", "meli-etl")
}

fn default_token_file() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("tokens.json"))
        .unwrap_or_else(|| PathBuf::from("tokens.json"))
}

impl Settings {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = project_dirs().context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load settings from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Credentials may come from the environment instead of the file.
    fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("MELI_CLIENT_ID") {
            self.client_id = id;
        }
        if let Ok(secret) = std::env::var("MELI_CLIENT_SECRET") {
            self.client_secret = secret;
        }
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid api_url: {}", self.api_url))?;
        url::Url::parse(&self.auth_url)
            .with_context(|| format!("Invalid auth_url: {}", self.auth_url))?;
        if self.rate_limit == 0 {
            anyhow::bail!("rate_limit must be at least 1");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Token endpoint, served from the API host.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.api_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            client_id = "123"
            rate_limit = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.client_id, "123");
        assert_eq!(settings.rate_limit, 5);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn token_url_ignores_trailing_slash() {
        let settings = Settings {
            api_url: "http://localhost:9000/".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.token_url(), "http://localhost:9000/oauth/token");
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "api_url = \"http://127.0.0.1:1\"\nfallback_expires_at = \"2030-01-01T00:00:00\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.api_url, "http://127.0.0.1:1");
        assert_eq!(settings.fallback_expires_at, "2030-01-01T00:00:00");
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "rate_limit = 0\n").unwrap();

        assert!(Settings::load(Some(&path)).is_err());
    }
}
