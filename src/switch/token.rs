//! File-based session token cache.
//!
//! The switch only allows a handful of concurrent sessions, so a token
//! from a recent login is reused across invocations while it is fresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, SwitchError};

/// How long a cached token is reused, in seconds.
pub const TOKEN_FRESHNESS_SECS: i64 = 15 * 60;

/// Cache directory name under the user cache directory.
const CACHE_DIR: &str = "gs316ep";

/// Token file name.
const TOKEN_FILE: &str = "token.json";

/// A token persisted by a previous login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    /// The `Gambit` session token.
    pub token: String,
    /// Switch host the token belongs to.
    pub host: String,
    /// When the login happened.
    pub acquired_at: DateTime<Utc>,
    /// When the token stops being reused.
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Creates a token entry acquired now.
    #[must_use]
    pub fn new(token: &str, host: &str) -> Self {
        let now = Utc::now();
        Self {
            token: token.to_string(),
            host: host.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(TOKEN_FRESHNESS_SECS),
        }
    }

    /// Checks if the token is past its freshness window.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining freshness in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

/// Token cache stored as a JSON file.
#[derive(Debug, Clone)]
pub struct TokenCache {
    /// Path to the token file.
    path: PathBuf,
}

impl TokenCache {
    /// Creates a cache in the user cache directory, one file per host.
    #[must_use]
    pub fn for_host(host: &str) -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        let host_dir: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
            .collect();
        Self::with_path(base.join(CACHE_DIR).join(host_dir).join(TOKEN_FILE))
    }

    /// Creates a cache at a custom file path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the token file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached token if it exists and is still fresh.
    ///
    /// Unreadable or corrupted files count as no token.
    pub async fn load_fresh(&self) -> Option<CachedToken> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No cached token at {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_str::<CachedToken>(&content) {
            Ok(cached) if cached.is_expired() => {
                debug!("Cached token expired at {}", cached.expires_at.to_rfc3339());
                None
            }
            Ok(cached) => {
                debug!("Reusing cached token ({}s left)", cached.remaining_secs());
                Some(cached)
            }
            Err(e) => {
                debug!("Ignoring corrupted token cache {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Stores a freshly acquired token.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn store(&self, token: &str, host: &str) -> Result<CachedToken> {
        let cached = CachedToken::new(token, host);

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
            }
        }

        let content = serde_json::to_string_pretty(&cached)
            .map_err(|e| SwitchError::internal(format!("Failed to serialize token: {e}")))?;

        // Write to a temporary file first, then rename
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Token cached at {}", self.path.display());
        Ok(cached)
    }

    /// Removes the cached token.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (TokenCache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = TokenCache::with_path(temp_dir.path().join("switch").join(TOKEN_FILE));
        (cache, temp_dir)
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let (cache, _temp) = create_test_cache();

        cache.store("tok123", "10.0.0.2").await.expect("store");
        let loaded = cache.load_fresh().await.expect("token should be fresh");

        assert_eq!(loaded.token, "tok123");
        assert_eq!(loaded.host, "10.0.0.2");
        assert!(loaded.remaining_secs() > 0);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let (cache, _temp) = create_test_cache();
        assert!(cache.load_fresh().await.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_ignored() {
        let (cache, _temp) = create_test_cache();

        let mut stale = CachedToken::new("old", "10.0.0.2");
        stale.acquired_at -= chrono::Duration::minutes(30);
        stale.expires_at -= chrono::Duration::minutes(30);

        std::fs::create_dir_all(cache.path().parent().expect("parent")).expect("mkdir");
        std::fs::write(cache.path(), serde_json::to_string(&stale).expect("json")).expect("write");

        assert!(cache.load_fresh().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_cache_is_ignored() {
        let (cache, _temp) = create_test_cache();

        std::fs::create_dir_all(cache.path().parent().expect("parent")).expect("mkdir");
        std::fs::write(cache.path(), "not json").expect("write");

        assert!(cache.load_fresh().await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let (cache, _temp) = create_test_cache();

        cache.store("tok", "h").await.expect("store");
        cache.clear().await.expect("clear");

        assert!(!cache.path().exists());
        assert!(cache.load_fresh().await.is_none());
    }

    #[test]
    fn test_for_host_sanitizes() {
        let cache = TokenCache::for_host("192.168.0.2:8080");
        let dir = cache
            .path()
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .expect("host dir");
        assert_eq!(dir, "192.168.0.2_8080");
    }
}
