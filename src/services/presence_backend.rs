use async_trait::async_trait;
use deadpool_redis::redis::{cmd, AsyncCommands};
use deadpool_redis::Pool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("store command failed: {0}")]
    Command(String),
}

/// TTL-bearing key/value storage for serialized presence records.
#[async_trait]
pub trait PresenceBackend: Send + Sync {
    /// Write the whole value and reset its time-to-live.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;
    async fn fetch(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// All live `(key, value)` pairs whose key starts with `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

/// Shared Redis store reached through a deadpool connection pool.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    const SCAN_BATCH: usize = 200;

    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl PresenceBackend for RedisBackend {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut keys: Vec<String> = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(Self::SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(|e| StoreError::Command(e.to_string()))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<String>> = cmd("MGET")
            .arg(&keys)
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;

        // keys may expire between SCAN and MGET
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }
}

#[derive(Debug, Clone)]
struct LocalEntry {
    value: String,
    expires_at: Instant,
}

impl LocalEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local map with client-side expiry bookkeeping.
#[derive(Clone, Default)]
pub struct LocalBackend {
    entries: Arc<RwLock<HashMap<String, LocalEntry>>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Value and remaining time-to-live of a live entry.
    async fn live_entry(&self, key: &str) -> Option<(String, Duration)> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| (entry.value.clone(), entry.expires_at - now))
    }

    /// Live entries under `prefix` with their remaining time-to-live.
    async fn live_entries(&self, prefix: &str) -> Vec<(String, String, Duration)> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone(), entry.expires_at - now))
            .collect()
    }

    /// Remove `key` only while it still holds `value`.
    async fn remove_if_unchanged(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.value == value) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl PresenceBackend for LocalBackend {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let entry = LocalEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }
}

/// Tries the shared store first and degrades to the local map on any failure.
///
/// A local entry exists only while the latest write for its key missed the
/// shared store, so the local copy always wins over the shared one. Reads
/// that find a local copy push it back to the shared store once that is
/// reachable again.
#[derive(Clone)]
pub struct FallbackBackend<R> {
    remote: R,
    local: LocalBackend,
}

impl<R: PresenceBackend> FallbackBackend<R> {
    pub fn new(remote: R, local: LocalBackend) -> Self {
        Self { remote, local }
    }

    pub fn local(&self) -> &LocalBackend {
        &self.local
    }

    async fn promote(&self, key: &str, value: &str, ttl: Duration) {
        match self.remote.put(key, value.to_string(), ttl).await {
            Ok(()) => {
                self.local.remove_if_unchanged(key, value).await;
                info!("Presence record {} written back to shared store", key);
            }
            Err(e) => debug!("Presence record {} stays local: {}", key, e),
        }
    }
}

#[async_trait]
impl<R: PresenceBackend> PresenceBackend for FallbackBackend<R> {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        match self.remote.put(key, value.clone(), ttl).await {
            Ok(()) => {
                // keep a single authoritative copy once the shared store is back
                self.local.delete(key).await?;
                Ok(())
            }
            Err(e) => {
                warn!("Presence write for {} falling back to local store: {}", key, e);
                self.local.put(key, value, ttl).await
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        if let Some((value, ttl)) = self.local.live_entry(key).await {
            self.promote(key, &value, ttl).await;
            return Ok(Some(value));
        }

        match self.remote.fetch(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!("Presence read for {} failed on shared store: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if let Err(e) = self.remote.delete(key).await {
            warn!("Presence delete for {} not applied to shared store: {}", key, e);
        }
        self.local.delete(key).await
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let (mut merged, remote_up): (HashMap<String, String>, bool) =
            match self.remote.scan(prefix).await {
                Ok(remote) => (remote.into_iter().collect(), true),
                Err(e) => {
                    debug!("Presence scan served from local store only: {}", e);
                    (HashMap::new(), false)
                }
            };

        for (key, value, ttl) in self.local.live_entries(prefix).await {
            if remote_up {
                self.promote(&key, &value, ttl).await;
            }
            merged.insert(key, value);
        }

        Ok(merged.into_iter().collect())
    }
}
