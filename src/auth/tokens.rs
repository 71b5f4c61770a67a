//! Token storage and management

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Tokens are treated as stale this long before they actually expire.
const FRESHNESS_MARGIN_SECS: i64 = 300;

/// Lifetime the marketplace grants access tokens, used for the fallback record.
const DEFAULT_EXPIRES_IN: u64 = 21600;

/// Persisted bearer token. Replaced wholesale, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    /// ISO-8601; RFC 3339 when written by us, possibly naive local time
    /// when it comes from the fallback configuration.
    #[serde(default)]
    pub expires_at: String,
}

impl Token {
    /// Parse `expires_at`, accepting RFC 3339 or a naive local timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.expires_at) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(&self.expires_at, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(exp) => now < exp - Duration::seconds(FRESHNESS_MARGIN_SECS),
            None => false,
        }
    }

    /// Stamp `expires_at` from `expires_in`, counted from `now`.
    pub fn stamp_expiry(&mut self, now: DateTime<Utc>) {
        // Clamp to ten years so absurd values cannot overflow the timestamp.
        let secs = self.expires_in.min(315_360_000) as i64;
        self.expires_at = (now + Duration::seconds(secs)).to_rfc3339();
    }
}

/// A missing token is never fresh.
pub fn is_fresh(token: Option<&Token>) -> bool {
    token.is_some_and(|t| t.is_fresh_at(Utc::now()))
}

/// Token store trait for different storage backends
pub trait TokenStore {
    /// Current record, or the configured fallback when nothing is stored.
    fn load(&self) -> Result<Token>;
    /// Stamp expiry and overwrite the stored record.
    fn save(&self, token: &mut Token) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file backend.
pub struct FileTokenStore {
    path: PathBuf,
    fallback: Token,
}

impl FileTokenStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            path: settings.token_file.clone(),
            fallback: Token {
                access_token: settings.fallback_access_token.clone(),
                token_type: "Bearer".to_string(),
                expires_in: DEFAULT_EXPIRES_IN,
                refresh_token: settings.fallback_refresh_token.clone(),
                expires_at: settings.fallback_expires_at.clone(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Token> {
        if !self.path.exists() {
            return Ok(self.fallback.clone());
        }

        let content = fs::read_to_string(&self.path).context("Failed to read token file")?;
        serde_json::from_str(&content).context("Failed to parse token file")
    }

    fn save(&self, token: &mut Token) -> Result<()> {
        token.stamp_expiry(Utc::now());

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).context("Failed to create token directory")?;
            }
        }

        let content = serde_json::to_string_pretty(token).context("Failed to serialize token")?;
        fs::write(&self.path, content).context("Failed to write token file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms).context("Failed to set token permissions")?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}
