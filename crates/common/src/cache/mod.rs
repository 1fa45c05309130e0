//! Key-value cache adapter
//!
//! Provides:
//! - Typed get/set operations with TTL, JSON-transparent values
//! - Raw string storage for scalar payloads
//! - Pattern-based invalidation for administrative use
//! - A pluggable backend (Redis in production, in-memory for tests)

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Storage operations the cache adapter is built on.
///
/// Values cross this boundary as strings; JSON encoding happens in [`Cache`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;
    async fn ping(&self) -> Result<()>;
}

/// Redis-backed cache storage
pub struct RedisBackend {
    connection: RwLock<MultiplexedConnection>,
}

impl RedisBackend {
    /// Connect to Redis at the given URL
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::Cache {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Cache {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
        })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.write().await;
        let value: Option<String> = conn.get(key).await.map_err(|e| AppError::Cache {
            message: format!("Failed to get key '{}': {}", key, e),
        })?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection.write().await;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| AppError::Cache {
                message: format!("Failed to set key '{}': {}", key, e),
            })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.write().await;
        let deleted: i32 = conn.del(key).await.map_err(|e| AppError::Cache {
            message: format!("Failed to delete key '{}': {}", key, e),
        })?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.write().await;
        let exists: bool = conn.exists(key).await.map_err(|e| AppError::Cache {
            message: format!("Failed to check key '{}': {}", key, e),
        })?;
        Ok(exists)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.connection.write().await;

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(|e| AppError::Cache {
                    message: format!("Failed to scan pattern '{}': {}", pattern, e),
                })?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn.del(&keys).await.map_err(|e| AppError::Cache {
            message: format!("Failed to delete pattern '{}': {}", pattern, e),
        })?;
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::Cache {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory cache storage, used by the test suites
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|at| at <= Instant::now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let expires_at = (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs));
        self.entries.write().await.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let matching: Vec<String> = entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        for key in &matching {
            entries.remove(key);
        }
        Ok(matching.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Minimal glob matcher supporting `*` wildcards, the only syntax the
/// administrative invalidation surface uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut remainder = key;
    let mut parts = pattern.split('*').peekable();
    let mut anchored = true;

    while let Some(part) = parts.next() {
        if part.is_empty() {
            anchored = false;
            continue;
        }
        if anchored {
            if !remainder.starts_with(part) {
                return false;
            }
            remainder = &remainder[part.len()..];
            anchored = false;
        } else if parts.peek().is_none() && !pattern.ends_with('*') {
            return remainder.ends_with(part);
        } else {
            match remainder.find(part) {
                Some(idx) => remainder = &remainder[idx + part.len()..],
                None => return false,
            }
        }
    }

    pattern.ends_with('*') || remainder.is_empty()
}

/// Cache adapter over a [`CacheBackend`]
///
/// Structured values round-trip through JSON; plain strings are stored
/// verbatim so payloads stay readable from `redis-cli`.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    /// Create a cache over an existing backend
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Connect to Redis and wrap it in a cache adapter
    pub async fn connect(url: &str) -> Result<Self> {
        let backend = RedisBackend::connect(url).await?;
        Ok(Self::new(Arc::new(backend)))
    }

    /// Get a JSON-encoded value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(raw) => {
                let parsed = serde_json::from_str(&raw).map_err(|e| AppError::Cache {
                    message: format!("Failed to parse cached value for '{}': {}", key, e),
                })?;
                debug!(key = %key, "Cache hit");
                Ok(Some(parsed))
            }
            None => {
                debug!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Get a raw string value from cache
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self.backend.get(key).await?;
        debug!(key = %key, hit = value.is_some(), "Cache lookup");
        Ok(value)
    }

    /// Get a value as JSON, falling back to a raw string when the stored
    /// payload is not valid JSON.
    pub async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.backend.get(key).await?.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        }))
    }

    /// Set a value in cache with the given TTL
    ///
    /// Mappings and sequences are serialized to JSON; string scalars are
    /// stored as-is.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let encoded = match serde_json::to_value(value).map_err(|e| AppError::Cache {
            message: format!("Failed to serialize value for '{}': {}", key, e),
        })? {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.set_raw(key, &encoded, ttl_secs).await
    }

    /// Set a raw string value in cache with the given TTL
    pub async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.backend.set(key, value, ttl_secs).await?;
        debug!(key = %key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let deleted = self.backend.delete(key).await?;
        debug!(key = %key, deleted, "Cache delete");
        Ok(deleted)
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }

    /// Delete all keys matching a glob pattern
    pub async fn clear_by_pattern(&self, pattern: &str) -> Result<u64> {
        let deleted = self.backend.delete_pattern(pattern).await?;
        debug!(pattern = %pattern, deleted, "Cache pattern clear");
        Ok(deleted)
    }

    /// Ping the backend to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }
}

/// Cache key builders
///
/// Key formats are part of the external contract and must not drift.
pub mod keys {
    /// Build an article summary cache key
    pub fn article_summary(article_id: i64) -> String {
        format!("summary:article:{}", article_id)
    }

    /// Build a top-headlines cache key covering every query parameter
    pub fn headlines(category: Option<&str>, country: &str, page: u32, page_size: u32) -> String {
        format!(
            "news:headlines:{}:{}:{}:{}",
            category.unwrap_or("all"),
            country,
            page,
            page_size
        )
    }

    /// Build a news search cache key covering every query parameter
    pub fn search(query: &str, page: u32, page_size: u32, from_date: Option<&str>) -> String {
        format!(
            "news:search:{}:{}:{}:{}",
            query,
            page,
            page_size,
            from_date.unwrap_or("all")
        )
    }

    /// Build a per-user conversation history key
    pub fn chat_history(user_id: i64) -> String {
        format!("chat:history:{}", user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn test_key_formats() {
        assert_eq!(keys::article_summary(42), "summary:article:42");
        assert_eq!(
            keys::headlines(Some("technology"), "us", 1, 20),
            "news:headlines:technology:us:1:20"
        );
        assert_eq!(keys::headlines(None, "us", 1, 20), "news:headlines:all:us:1:20");
        assert_eq!(
            keys::search("rust", 2, 50, Some("2026-01-01")),
            "news:search:rust:2:50:2026-01-01"
        );
        assert_eq!(keys::search("rust", 1, 20, None), "news:search:rust:1:20:all");
        assert_eq!(keys::chat_history(7), "chat:history:7");
    }

    #[test]
    fn test_distinct_headline_tuples_never_collide() {
        let a = keys::headlines(Some("business"), "us", 1, 20);
        let b = keys::headlines(Some("business"), "us", 2, 20);
        let c = keys::headlines(Some("business"), "gb", 1, 20);
        let d = keys::headlines(None, "us", 1, 20);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        // Identical tuples always share a key
        assert_eq!(a, keys::headlines(Some("business"), "us", 1, 20));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("news:*", "news:headlines:all:us:1:20"));
        assert!(glob_match("chat:history:*", "chat:history:7"));
        assert!(!glob_match("chat:history:*", "news:search:rust:1:20:all"));
        assert!(glob_match("summary:article:42", "summary:article:42"));
        assert!(!glob_match("summary:article:42", "summary:article:421"));
        assert!(glob_match("*:history:*", "chat:history:7"));
    }

    #[test]
    fn test_memory_backend_roundtrip() {
        tokio_test::block_on(async {
            let cache = Cache::new(Arc::new(MemoryBackend::new()));

            cache.set_raw("k1", "hello", 60).await.unwrap();
            assert_eq!(cache.get_raw("k1").await.unwrap().as_deref(), Some("hello"));
            assert!(cache.exists("k1").await.unwrap());

            assert!(cache.delete("k1").await.unwrap());
            assert!(!cache.delete("k1").await.unwrap());
            assert!(!cache.exists("k1").await.unwrap());
        });
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        let payload = Payload {
            name: "top".into(),
            count: 3,
        };

        cache.set("payload", &payload, 60).await.unwrap();
        let back: Payload = cache.get("payload").await.unwrap().unwrap();
        assert_eq!(back, payload);

        let missing: Option<Payload> = cache.get("absent").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_value_falls_back_to_raw_string() {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));

        cache.set_raw("plain", "not json at all", 60).await.unwrap();
        assert_eq!(
            cache.get_value("plain").await.unwrap(),
            Some(serde_json::Value::String("not json at all".into()))
        );

        cache
            .set("structured", &serde_json::json!({"a": 1}), 60)
            .await
            .unwrap();
        assert_eq!(
            cache.get_value("structured").await.unwrap(),
            Some(serde_json::json!({"a": 1}))
        );
    }

    #[tokio::test]
    async fn test_string_values_stored_verbatim() {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        cache.set("summary", &"A short summary.".to_string(), 60).await.unwrap();
        assert_eq!(
            cache.get_raw("summary").await.unwrap().as_deref(),
            Some("A short summary.")
        );
    }

    #[tokio::test]
    async fn test_clear_by_pattern() {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        cache.set_raw("news:headlines:all:us:1:20", "{}", 60).await.unwrap();
        cache.set_raw("news:search:rust:1:20:all", "{}", 60).await.unwrap();
        cache.set_raw("chat:history:7", "[]", 60).await.unwrap();

        let deleted = cache.clear_by_pattern("news:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(!cache.exists("news:headlines:all:us:1:20").await.unwrap());
        assert!(cache.exists("chat:history:7").await.unwrap());
    }
}
