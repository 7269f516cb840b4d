use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::guest::{ConnectionId, GuestId};

#[derive(Default)]
struct Bindings {
    by_connection: HashMap<ConnectionId, GuestId>,
    by_guest: HashMap<GuestId, ConnectionId>,
}

/// Process-local index between live connections and guests.
///
/// Never persisted or shared across processes. Only the gateway mutates it.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    bindings: Arc<RwLock<Bindings>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection to a guest, replacing any earlier binding of either.
    ///
    /// A guest keeps at most one connection: the reverse entry of a stale
    /// connection is dropped so its later disconnect cannot touch the guest.
    pub async fn bind(&self, connection_id: ConnectionId, guest_id: GuestId) {
        let mut bindings = self.bindings.write().await;

        if let Some(previous_guest) = bindings.by_connection.insert(connection_id, guest_id) {
            if previous_guest != guest_id
                && bindings.by_guest.get(&previous_guest) == Some(&connection_id)
            {
                bindings.by_guest.remove(&previous_guest);
            }
        }

        if let Some(stale) = bindings.by_guest.insert(guest_id, connection_id) {
            if stale != connection_id {
                bindings.by_connection.remove(&stale);
                info!("Guest {} rebound from connection {} to {}", guest_id, stale, connection_id);
            }
        }

        debug!("Bound connection {} to guest {}", connection_id, guest_id);
    }

    pub async fn connection_for(&self, guest_id: &GuestId) -> Option<ConnectionId> {
        self.bindings.read().await.by_guest.get(guest_id).copied()
    }

    pub async fn guest_for(&self, connection_id: &ConnectionId) -> Option<GuestId> {
        self.bindings.read().await.by_connection.get(connection_id).copied()
    }

    /// Remove a connection. Returns the guest it was bound to, if any.
    pub async fn unbind(&self, connection_id: &ConnectionId) -> Option<GuestId> {
        let mut bindings = self.bindings.write().await;
        let guest_id = bindings.by_connection.remove(connection_id)?;
        if bindings.by_guest.get(&guest_id) == Some(connection_id) {
            bindings.by_guest.remove(&guest_id);
        }
        debug!("Unbound connection {} from guest {}", connection_id, guest_id);
        Some(guest_id)
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.by_connection.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_bind_and_lookup_both_ways() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        let guest = Uuid::new_v4();

        registry.bind(conn, guest).await;
        assert_eq!(registry.connection_for(&guest).await, Some(conn));
        assert_eq!(registry.guest_for(&conn).await, Some(guest));

        assert_eq!(registry.unbind(&conn).await, Some(guest));
        assert_eq!(registry.connection_for(&guest).await, None);
        assert_eq!(registry.guest_for(&conn).await, None);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_reconnect_drops_stale_connection() {
        let registry = ConnectionRegistry::new();
        let guest = Uuid::new_v4();
        let old_conn = Uuid::new_v4();
        let new_conn = Uuid::new_v4();

        registry.bind(old_conn, guest).await;
        registry.bind(new_conn, guest).await;

        assert_eq!(registry.connection_for(&guest).await, Some(new_conn));
        assert_eq!(registry.guest_for(&old_conn).await, None);

        // late disconnect of the old socket must not unbind the new one
        assert_eq!(registry.unbind(&old_conn).await, None);
        assert_eq!(registry.connection_for(&guest).await, Some(new_conn));
    }

    #[tokio::test]
    async fn test_rebinding_connection_overwrites_guest() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        registry.bind(conn, first).await;
        registry.bind(conn, second).await;

        assert_eq!(registry.guest_for(&conn).await, Some(second));
        assert_eq!(registry.connection_for(&first).await, None);
        assert_eq!(registry.len().await, 1);
    }
}
