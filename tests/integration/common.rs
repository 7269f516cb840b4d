use anonchat_relay::{
    config::Config,
    models::{
        events::{ClientEvent, ServerEvent},
        guest::{ConnectionId, GuestProfile, GuestSession},
    },
    state::AppState,
};
use tokio::sync::broadcast::Receiver;
use uuid::Uuid;

/// One guest holding one live connection.
pub struct TestClient {
    pub guest: GuestSession,
    pub conn: ConnectionId,
    pub rx: Receiver<String>,
}

impl TestClient {
    pub async fn connect(state: &AppState, name: &str) -> Self {
        let guest = state
            .presence
            .create(GuestProfile {
                username: Some(name.to_string()),
                ..Default::default()
            })
            .await
            .expect("create guest");
        let (token, _) = state.tokens.issue(&guest).expect("issue token");

        let conn = Uuid::new_v4();
        let rx = state.hub.register(conn).await;
        let guest = state
            .gateway
            .on_connect(conn, &token)
            .await
            .expect("admit connection");
        TestClient { guest, conn, rx }
    }

    pub async fn send(&self, state: &AppState, event: ClientEvent) {
        state.gateway.dispatch(&self.conn, event).await;
    }

    pub async fn disconnect(&self, state: &AppState) {
        state.gateway.on_disconnect(&self.conn).await;
        state.hub.unregister(&self.conn).await;
    }

    /// Everything delivered so far, stats broadcasts excluded.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            let event: ServerEvent = serde_json::from_str(&frame).expect("valid frame");
            if !matches!(event, ServerEvent::RealtimeStats { .. }) {
                events.push(event);
            }
        }
        events
    }
}

pub fn test_state() -> AppState {
    AppState::in_memory(Config::with_key("integration_test_key"))
}

/// Match `a` (who waits) with `b` (who finds them) and clear both inboxes.
pub async fn paired(state: &AppState, a: &mut TestClient, b: &mut TestClient) {
    a.send(state, ClientEvent::Match).await;
    b.send(state, ClientEvent::Match).await;
    a.drain();
    b.drain();
}
