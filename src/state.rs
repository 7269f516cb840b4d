use crate::config::Config;
use crate::services::{
    BlobStore, ConnectionHub, ConnectionRegistry, FallbackBackend, LocalBackend, PresenceBackend,
    PresenceStore, RateLimiter, RedisBackend, SessionGateway, TokenService,
};
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config as RedisConfig, Pool, PoolConfig, Runtime};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: PresenceStore,
    pub blobs: BlobStore,
    pub hub: ConnectionHub,
    pub limiter: RateLimiter,
    pub tokens: TokenService,
    pub gateway: SessionGateway,
    local_presence: LocalBackend,
}

impl AppState {
    /// Presence backed by Redis, degrading to the process-local map whenever
    /// Redis is unreachable.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let mut redis_config = RedisConfig::from_url(config.redis.url.clone());
        redis_config.pool = Some(PoolConfig {
            max_size: config.redis.max_connections as usize,
            ..Default::default()
        });

        let redis = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow::anyhow!("Failed to create Redis pool: {}", e))?;

        // Startup continues without Redis; every write falls back locally
        match ping(&redis).await {
            Ok(()) => info!("Connected to Redis at {}", config.redis.url),
            Err(e) => warn!("Redis unavailable ({}), presence will use local fallback", e),
        }

        let local = LocalBackend::new();
        let backend = FallbackBackend::new(RedisBackend::new(redis), local.clone());
        Ok(Self::assemble(config, Arc::new(backend), local))
    }

    /// Presence kept entirely in this process.
    pub fn in_memory(config: Config) -> Self {
        let local = LocalBackend::new();
        Self::assemble(config, Arc::new(local.clone()), local)
    }

    fn assemble(config: Config, backend: Arc<dyn PresenceBackend>, local: LocalBackend) -> Self {
        let presence = PresenceStore::new(backend, config.presence_ttl());
        let blobs = BlobStore::new(config.blobs.max_blob_bytes);
        let hub = ConnectionHub::new(config.websocket.channel_size);
        let limiter = RateLimiter::per_minute(config.rate_limit.events_per_minute);
        let tokens = TokenService::new(&config.security.master_hmac_key, config.token_ttl());

        let gateway = SessionGateway::new(
            presence.clone(),
            ConnectionRegistry::new(),
            blobs.clone(),
            Arc::new(hub.clone()),
            tokens.clone(),
            limiter.clone(),
            config.chat.clone(),
        );

        Self {
            config: Arc::new(config),
            presence,
            blobs,
            hub,
            limiter,
            tokens,
            gateway,
            local_presence: local,
        }
    }

    /// Periodic sweeps: expired local presence, expired blobs, idle rate windows.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let blob_sweeper = self
            .blobs
            .spawn_sweeper(Duration::from_secs(self.config.blobs.sweep_interval_seconds));

        let local = self.local_presence.clone();
        let presence_every = Duration::from_secs(self.config.presence.sweep_interval_seconds);
        let presence_sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(presence_every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = local.sweep().await;
                if removed > 0 {
                    info!("Presence sweep removed {} expired local records", removed);
                }
            }
        });

        let limiter = self.limiter.clone();
        let purge_every = Duration::from_secs(self.config.rate_limit.purge_interval_seconds);
        let limiter_purge = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(purge_every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.purge_stale().await;
            }
        });

        vec![blob_sweeper, presence_sweeper, limiter_purge]
    }
}

async fn ping(pool: &Pool) -> Result<(), anyhow::Error> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get Redis connection: {}", e))?;
    let _: String = cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| anyhow::anyhow!("Redis connection test failed: {}", e))?;
    Ok(())
}
