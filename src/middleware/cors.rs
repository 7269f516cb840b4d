use crate::config::CorsConfig;
use http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

const FALLBACK_ORIGIN: &str = "http://localhost:3000";

const METHODS: [Method; 4] = [Method::GET, Method::POST, Method::OPTIONS, Method::HEAD];

/// CORS layer for the REST surface and the websocket upgrade.
///
/// `allowed_origin` is a comma-separated list. `*` allows any origin without
/// credentials and is meant for local development only.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<&str> = config
        .allowed_origin
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if origins.contains(&"*") {
        warn!("Wildcard CORS enabled; do not use this in production");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(METHODS)
            .allow_headers(Any)
            .expose_headers(Any)
            .max_age(Duration::from_secs(3600));
    }

    let mut parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        warn!("No valid CORS origins configured, using {}", FALLBACK_ORIGIN);
        parsed.push(HeaderValue::from_static(FALLBACK_ORIGIN));
    }
    info!("CORS: allowing {} origin(s)", parsed.len());

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(METHODS)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CACHE_CONTROL,
        ])
        .allow_credentials(true)
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH, header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(3600))
}
