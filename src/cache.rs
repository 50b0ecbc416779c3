//! Short-lived in-process caches for leaderboards, AI responses and
//! general lookups.

use moka::{Expiry, future::Cache};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

const MAX_ENTRIES: u64 = 10_000;

/// AI responses are kept longer than the AI cache default.
pub const AI_RESPONSE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: Duration,
}

struct PerEntryTtl;

impl<V> Expiry<String, Entry<V>> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry<V>, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    // Overwriting a key restarts its clock.
    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: u64,
}

/// A string-keyed cache with a default TTL that individual entries may override.
pub struct TtlCache<V> {
    name: &'static str,
    inner: Cache<String, Entry<V>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            name,
            inner,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        match self.inner.get(key).await {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache = self.name, %key, "Cache hit");
                Some(entry.value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        tracing::debug!(cache = self.name, %key, ttl_secs = ttl.as_secs(), "Cache set");
        self.inner.insert(key, Entry { value, ttl }).await;
    }

    pub async fn del(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub async fn flush(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.inner.entry_count(),
        }
    }
}

impl TtlCache<serde_json::Value> {
    /// Reads a cached JSON value back into a typed result. Entries that no
    /// longer decode are treated as misses.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value).ok()
    }

    pub async fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Option<Duration>) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(json) => {
                let ttl = ttl.unwrap_or(self.default_ttl);
                self.set_with_ttl(key, json, ttl).await
            }
            Err(e) => tracing::warn!(cache = self.name, %key, error = %e, "Skipping cache set for unserializable value"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheReport {
    pub leaderboard: CacheStats,
    pub ai: CacheStats,
    pub general: CacheStats,
}

/// The three caches shared by the services.
#[derive(Clone)]
pub struct CacheService {
    leaderboard: Arc<TtlCache<serde_json::Value>>,
    ai: Arc<TtlCache<String>>,
    general: Arc<TtlCache<serde_json::Value>>,
}

impl CacheService {
    pub fn new(leaderboard_ttl: Duration, default_ttl: Duration) -> Self {
        Self {
            leaderboard: Arc::new(TtlCache::new("leaderboard", leaderboard_ttl)),
            ai: Arc::new(TtlCache::new("ai", default_ttl)),
            general: Arc::new(TtlCache::new("general", default_ttl)),
        }
    }

    pub async fn get_leaderboard<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.leaderboard.get_as(key).await
    }

    pub async fn set_leaderboard<T: Serialize>(&self, key: &str, value: &T) {
        self.leaderboard.set_as(key, value, None).await;
    }

    pub async fn invalidate_leaderboard(&self) {
        self.leaderboard.flush().await;
        tracing::info!("Leaderboard cache invalidated");
    }

    pub async fn get_ai_response(&self, prompt: &str) -> Option<String> {
        self.ai.get(&ai_key(prompt)).await
    }

    pub async fn set_ai_response(&self, prompt: &str, response: &str) {
        self.ai
            .set_with_ttl(ai_key(prompt), response.to_string(), AI_RESPONSE_TTL)
            .await;
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.general.get_as(key).await
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        self.general.set_as(key, value, ttl).await;
    }

    pub async fn del(&self, key: &str) {
        self.general.del(key).await;
    }

    pub async fn flush_all(&self) {
        self.leaderboard.flush().await;
        self.ai.flush().await;
        self.general.flush().await;
        tracing::info!("All caches flushed");
    }

    pub async fn stats(&self) -> CacheReport {
        CacheReport {
            leaderboard: self.leaderboard.stats().await,
            ai: self.ai.stats().await,
            general: self.general.stats().await,
        }
    }
}

fn ai_key(prompt: &str) -> String {
    format!("ai:{}", hash_string(prompt))
}

/// 32-bit `h * 31 + unit` hash over UTF-16 code units, rendered as its
/// absolute value.
pub fn hash_string(input: &str) -> String {
    let hash = input
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32));
    hash.unsigned_abs().to_string()
}
