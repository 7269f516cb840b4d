use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,
    #[serde(default = "default_redis")]
    pub redis: RedisConfig,
    #[serde(default = "default_presence")]
    pub presence: PresenceConfig,
    #[serde(default = "default_blobs")]
    pub blobs: BlobConfig,
    #[serde(default = "default_chat")]
    pub chat: ChatConfig,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_cors")]
    pub cors: CorsConfig,
    #[serde(default = "default_websocket")]
    pub websocket: WebSocketConfig,
    pub security: SecurityConfig,
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: "0.0.0.0".to_string(),
        port: 3001,
        ws_path: "/ws".to_string(),
    }
}

fn default_redis() -> RedisConfig {
    RedisConfig {
        url: "redis://localhost:6379".to_string(),
        max_connections: 16,
    }
}

fn default_presence() -> PresenceConfig {
    PresenceConfig {
        ttl_seconds: default_presence_ttl(),
        sweep_interval_seconds: default_presence_sweep(),
    }
}

fn default_presence_ttl() -> u64 {
    2 * 60 * 60 // 2 hours
}

fn default_presence_sweep() -> u64 {
    60
}

fn default_blobs() -> BlobConfig {
    BlobConfig {
        default_ttl_minutes: default_blob_ttl(),
        sweep_interval_seconds: default_blob_sweep(),
        max_blob_bytes: default_max_blob_bytes(),
    }
}

fn default_blob_ttl() -> u32 {
    120
}

fn default_blob_sweep() -> u64 {
    5 * 60
}

fn default_max_blob_bytes() -> usize {
    25 * 1024 * 1024 // 25MB
}

fn default_chat() -> ChatConfig {
    ChatConfig {
        max_text_chars: default_max_text_chars(),
        max_file_bytes: default_max_file_bytes(),
    }
}

fn default_max_text_chars() -> usize {
    1000
}

fn default_max_file_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        events_per_minute: default_events_per_minute(),
        purge_interval_seconds: default_limiter_purge(),
    }
}

fn default_events_per_minute() -> u32 {
    100
}

fn default_limiter_purge() -> u64 {
    120
}

fn default_cors() -> CorsConfig {
    CorsConfig {
        allowed_origin: default_cors_origin(),
    }
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_websocket() -> WebSocketConfig {
    WebSocketConfig {
        channel_size: default_ws_channel_size(),
        max_message_size_bytes: default_ws_max_message_size(),
        heartbeat_interval_seconds: default_ws_heartbeat_interval(),
        connection_timeout_seconds: default_ws_connection_timeout(),
    }
}

fn default_ws_channel_size() -> usize {
    100
}

fn default_ws_max_message_size() -> usize {
    64 * 1024 // 64KB
}

fn default_ws_heartbeat_interval() -> u64 {
    30
}

fn default_ws_connection_timeout() -> u64 {
    300 // 5 minutes
}

fn default_token_ttl() -> u64 {
    2 * 60 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ws_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Guest presence records. Every write resets the TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_presence_ttl")]
    pub ttl_seconds: u64,
    /// Interval of the sweep over the process-local fallback map
    #[serde(default = "default_presence_sweep")]
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_blob_ttl")]
    pub default_ttl_minutes: u32,
    #[serde(default = "default_blob_sweep")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_max_blob_bytes")]
    pub max_blob_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    /// Ceiling for the declared size of file and voice attachments
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_events_per_minute")]
    pub events_per_minute: u32,
    #[serde(default = "default_limiter_purge")]
    pub purge_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub master_hmac_key: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_origin")]
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_ws_channel_size")]
    pub channel_size: usize,
    #[serde(default = "default_ws_max_message_size")]
    pub max_message_size_bytes: usize,
    #[serde(default = "default_ws_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    #[serde(default = "default_ws_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, figment::Error> {
        dotenvy::dotenv().ok();

        use figment::{providers::Env, Figment};

        // Accept the conventional REDIS_URL alongside REDIS__URL
        if std::env::var("REDIS__URL").is_err() {
            if let Ok(redis_url) = std::env::var("REDIS_URL") {
                std::env::set_var("REDIS__URL", redis_url);
            }
        }

        let mut config: Config = Figment::new()
            .merge(Env::raw().split("__"))
            .extract()?;

        if config.server.host.is_empty() {
            config.server = default_server();
        }
        if config.redis.url.is_empty() {
            config.redis = default_redis();
        }
        if config.presence.ttl_seconds == 0 {
            config.presence = default_presence();
        }
        if config.rate_limit.events_per_minute == 0 {
            config.rate_limit = default_rate_limit();
        }
        if config.cors.allowed_origin.is_empty() {
            config.cors = default_cors();
        }

        if config.security.master_hmac_key.is_empty() {
            return Err(figment::Error::from("SECURITY__MASTER_HMAC_KEY is required"));
        }

        Ok(config)
    }

    /// Configuration with every default applied, keyed by the given secret.
    pub fn with_key(master_hmac_key: impl Into<String>) -> Self {
        Self {
            server: default_server(),
            redis: default_redis(),
            presence: default_presence(),
            blobs: default_blobs(),
            chat: default_chat(),
            rate_limit: default_rate_limit(),
            cors: default_cors(),
            websocket: default_websocket(),
            security: SecurityConfig {
                master_hmac_key: master_hmac_key.into(),
                token_ttl_seconds: default_token_ttl(),
            },
        }
    }

    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence.ttl_seconds)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.security.token_ttl_seconds)
    }
}
