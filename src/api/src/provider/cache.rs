//! File-based response cache with TTL support.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ProviderError;

/// Cache entry with timestamp
#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Cache categories with different TTLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCategory {
    Schedule, // 24 hours
    Session,  // 30 days
}

impl CacheCategory {
    /// Get TTL duration
    pub fn ttl(&self) -> Duration {
        match self {
            CacheCategory::Schedule => Duration::hours(24),
            // Completed sessions do not change once published
            CacheCategory::Session => Duration::days(30),
        }
    }

    /// Get directory name for this category
    pub fn dir_name(&self) -> &str {
        match self {
            CacheCategory::Schedule => "schedule",
            CacheCategory::Session => "session",
        }
    }
}

/// File-based cache for provider responses.
///
/// A disabled cache never hits and never writes.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    base_dir: PathBuf,
    enabled: bool,
}

impl ResponseCache {
    /// Create a new cache with the given base directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            enabled: true,
        }
    }

    /// Create a cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            base_dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn category_dir(&self, category: CacheCategory) -> PathBuf {
        self.base_dir.join(category.dir_name())
    }

    fn cache_path(&self, category: CacheCategory, key: &str) -> PathBuf {
        self.category_dir(category)
            .join(format!("{}.json", sanitize_key(key)))
    }

    /// Get cached data if present and not expired
    pub fn get<T: DeserializeOwned>(&self, category: CacheCategory, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let path = self.cache_path(category, key);
        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Discarding unreadable cache entry {}: {}", path.display(), e);
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };

        let elapsed = Utc::now() - entry.cached_at;
        if elapsed > category.ttl() {
            let _ = std::fs::remove_file(&path);
            return None;
        }

        Some(entry.data)
    }

    /// Store data under a key
    pub fn set<T: Serialize>(
        &self,
        category: CacheCategory,
        key: &str,
        data: &T,
    ) -> Result<(), ProviderError> {
        if !self.enabled {
            return Ok(());
        }

        let dir = self.category_dir(category);
        std::fs::create_dir_all(&dir)?;

        let entry = CacheEntry {
            data,
            cached_at: Utc::now(),
        };

        let content = serde_json::to_string(&entry)?;
        std::fs::write(self.cache_path(category, key), content)?;

        Ok(())
    }

    /// Clear all cached responses
    pub fn clear_all(&self) -> Result<(), ProviderError> {
        if self.enabled && self.base_dir.exists() {
            std::fs::remove_dir_all(&self.base_dir)?;
        }
        Ok(())
    }
}

/// Turn a request key (endpoint plus query) into a file name
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(name: &str) -> ResponseCache {
        let dir = std::env::temp_dir().join(format!(
            "f1-api-cache-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        ResponseCache::new(dir)
    }

    #[test]
    fn test_set_and_get() {
        let cache = temp_cache("roundtrip");
        let data = vec![1, 2, 3];

        cache.set(CacheCategory::Session, "laps?session_key=9158", &data).unwrap();
        let cached: Option<Vec<i32>> = cache.get(CacheCategory::Session, "laps?session_key=9158");
        assert_eq!(cached, Some(data));

        // Different category is a different namespace
        let other: Option<Vec<i32>> = cache.get(CacheCategory::Schedule, "laps?session_key=9158");
        assert!(other.is_none());

        cache.clear_all().unwrap();
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let cache = temp_cache("expired");
        let path = cache.cache_path(CacheCategory::Schedule, "meetings?year=2024");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let stale = CacheEntry {
            data: "old".to_string(),
            cached_at: Utc::now() - Duration::hours(48),
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let cached: Option<String> = cache.get(CacheCategory::Schedule, "meetings?year=2024");
        assert!(cached.is_none());
        assert!(!path.exists());

        cache.clear_all().unwrap();
    }

    #[test]
    fn test_corrupt_entry_is_ignored() {
        let cache = temp_cache("corrupt");
        let path = cache.cache_path(CacheCategory::Session, "drivers");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let cached: Option<Vec<String>> = cache.get(CacheCategory::Session, "drivers");
        assert!(cached.is_none());

        cache.clear_all().unwrap();
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = ResponseCache::disabled();
        cache.set(CacheCategory::Session, "k", &42).unwrap();
        let cached: Option<i32> = cache.get(CacheCategory::Session, "k");
        assert!(cached.is_none());
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(
            sanitize_key("laps?session_key=9158&driver_number=1"),
            "laps_session_key_9158_driver_number_1"
        );
    }
}
