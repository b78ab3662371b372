use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::MatchParams;

/// Errors that can occur with cache operations
///
/// These never leave this module as failures: every public operation
/// absorbs them into a miss/no-op and logs at warn, because a broken cache
/// must never fail the enclosing request.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Multi-tier cache manager
///
/// L1 (moka, in-memory) in front of L2 (Redis, shared across instances).
/// Redis being unreachable at startup degrades the service to L1-only
/// rather than refusing to boot.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    default_ttl_secs: u64,
}

impl CacheManager {
    /// Connect to Redis and build the L1 tier. A failed Redis connection is
    /// a degradation, not an error.
    pub async fn connect(redis_url: &str, l1_size: u64, default_ttl_secs: u64) -> Self {
        let redis = match Self::open_redis(redis_url).await {
            Ok(conn) => Some(Arc::new(tokio::sync::Mutex::new(conn))),
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), running with L1 cache only", e);
                None
            }
        };

        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(default_ttl_secs))
            .build();

        Self {
            redis,
            l1_cache,
            default_ttl_secs,
        }
    }

    async fn open_redis(redis_url: &str) -> Result<ConnectionManager, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(ConnectionManager::new(client).await?)
    }

    /// Get a value from cache (L1 first, then L2). Failures read as a miss.
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        match self.fetch(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn fetch<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let Some(redis) = &self.redis else {
            return Ok(None);
        };

        let mut conn = redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        if let Some(json) = value {
            tracing::trace!("L2 cache hit: {}", key);
            self.l1_cache
                .insert(key.to_string(), json.as_bytes().to_vec())
                .await;
            return Ok(Some(serde_json::from_str(&json)?));
        }

        tracing::trace!("Cache miss: {}", key);
        Ok(None)
    }

    /// Set a value with the default TTL. Failures are absorbed.
    pub async fn set<T>(&self, key: &str, value: &T)
    where
        T: Serialize,
    {
        self.set_with_ttl(key, value, self.default_ttl_secs).await;
    }

    /// Set a value with an explicit TTL in both tiers. Failures are
    /// absorbed; the write is idempotent and overwrite-based, so a lost
    /// write only means a later recompute.
    pub async fn set_with_ttl<T>(&self, key: &str, value: &T, ttl_secs: u64)
    where
        T: Serialize,
    {
        if let Err(e) = self.store(key, value, ttl_secs).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }

    async fn store<T>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        self.l1_cache
            .insert(key.to_string(), json.as_bytes().to_vec())
            .await;

        let Some(redis) = &self.redis else {
            return Ok(());
        };

        let mut conn = redis.lock().await;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(json)
            .query_async::<()>(&mut *conn)
            .await?;
        drop(conn);

        tracing::trace!("Cache set: {} (ttl {}s)", key, ttl_secs);
        Ok(())
    }

    /// Delete a single key from both tiers.
    pub async fn delete(&self, key: &str) {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            if let Err(e) = redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut *conn)
                .await
            {
                tracing::warn!("Cache delete failed for {}: {}", key, e);
            }
        }
    }

    /// Delete every key starting with `prefix`; returns how many L2 keys
    /// were dropped. The L1 tier cannot enumerate by prefix and is cleared
    /// wholesale.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.l1_cache.invalidate_all();

        let Some(redis) = &self.redis else {
            return 0;
        };

        let pattern = format!("{}*", prefix);
        let mut conn = redis.lock().await;
        let keys: Vec<String> = match redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut *conn)
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Cache key scan failed for {}: {}", pattern, e);
                return 0;
            }
        };

        if keys.is_empty() {
            return 0;
        }

        let dropped = keys.len();
        if let Err(e) = redis::cmd("DEL")
            .arg(keys)
            .query_async::<()>(&mut *conn)
            .await
        {
            tracing::warn!("Cache prefix delete failed for {}: {}", pattern, e);
            return 0;
        }

        tracing::debug!("Invalidated {} keys under {}", dropped, prefix);
        dropped
    }

    /// Liveness probe against the L2 tier.
    pub async fn ping(&self) -> bool {
        let Some(redis) = &self.redis else {
            return false;
        };
        let mut conn = redis.lock().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .is_ok()
    }
}

/// Cache key builder
///
/// Match-result keys embed every request parameter in canonical form, so
/// semantically identical requests share an entry and a per-preference
/// prefix covers all of them for invalidation.
pub struct CacheKey;

impl CacheKey {
    /// Canonical key for a fully parameterized match request.
    pub fn matches(preference_id: &str, params: &MatchParams) -> String {
        format!(
            "{}{}:{}:{}:{}:{}",
            Self::matches_prefix(preference_id),
            params.page,
            params.limit,
            params.sort_by.as_str(),
            params.sort_order.as_str(),
            params.filters.canonical_string()
        )
    }

    /// Prefix shared by every match-result key for one preference.
    pub fn matches_prefix(preference_id: &str) -> String {
        format!("matches:{}:", preference_id)
    }

    /// Key for one cached LLM explanation.
    pub fn explanation(preference_id: &str, listing_id: &str) -> String {
        format!("{}{}", Self::explanation_prefix(preference_id), listing_id)
    }

    /// Prefix shared by every explanation key for one preference.
    pub fn explanation_prefix(preference_id: &str) -> String {
        format!("explain:{}:", preference_id)
    }
}
