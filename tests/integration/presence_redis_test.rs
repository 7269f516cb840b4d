// Presence against a live Redis.
// Run with: REDIS_URL=redis://localhost:6379 cargo test --test integration -- --ignored

use anonchat_relay::{
    config::Config,
    models::guest::{GuestProfile, GuestUpdate},
    state::AppState,
};
use uuid::Uuid;

async fn redis_state() -> AppState {
    let mut config = Config::with_key("redis_test_key");
    if let Ok(url) = std::env::var("REDIS_URL") {
        config.redis.url = url;
    }
    AppState::new(config).await.expect("Failed to create state")
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_presence_round_trip() {
    let state = redis_state().await;

    let guest = state
        .presence
        .create(GuestProfile::default())
        .await
        .expect("Failed to create guest");

    let conn = Uuid::new_v4();
    let online = state
        .presence
        .update(&guest.id, GuestUpdate::online(conn))
        .await
        .expect("Failed to update guest")
        .expect("Guest vanished");
    assert!(online.is_online);
    assert_eq!(online.socket_id, Some(conn));

    let listed = state.presence.list_online().await.expect("Failed to list");
    assert!(listed.iter().any(|g| g.id == guest.id));

    state.presence.remove(&guest.id).await.expect("Failed to remove");
    assert!(state.presence.get(&guest.id).await.unwrap().is_none());
}
