use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::models::events::ServerEvent;
use crate::models::guest::ConnectionId;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("connection {0} is not attached")]
    NotAttached(ConnectionId),

    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Outbound fan-out transport.
///
/// The in-process [`ConnectionHub`] reaches connections held by this process;
/// a multi-process deployment plugs in an implementation that forwards to
/// whichever process holds the target connection or group.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_to(
        &self,
        connection: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), DeliveryError>;

    /// Deliver to every member of `group` except `except`. Returns the number reached.
    async fn send_to_group(
        &self,
        group: &str,
        event: &ServerEvent,
        except: Option<&ConnectionId>,
    ) -> usize;

    async fn broadcast(&self, event: &ServerEvent) -> usize;

    async fn join_group(&self, connection: &ConnectionId, group: &str);

    async fn dissolve_group(&self, group: &str);
}

#[derive(Default)]
struct HubInner {
    senders: HashMap<ConnectionId, broadcast::Sender<String>>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

/// In-memory outbound channels for the connections this process holds.
#[derive(Clone)]
pub struct ConnectionHub {
    inner: Arc<RwLock<HubInner>>,
    channel_size: usize,
}

impl ConnectionHub {
    pub fn new(channel_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HubInner::default())),
            channel_size: channel_size.max(1),
        }
    }

    /// Attach a connection and hand back the receiving end of its frame channel.
    pub async fn register(&self, connection: ConnectionId) -> broadcast::Receiver<String> {
        let (tx, rx) = broadcast::channel(self.channel_size);
        self.inner.write().await.senders.insert(connection, tx);
        info!("Registered connection {}", connection);
        rx
    }

    /// Detach a connection and drop it from every group.
    pub async fn unregister(&self, connection: &ConnectionId) {
        let mut inner = self.inner.write().await;
        inner.senders.remove(connection);
        inner.groups.retain(|_, members| {
            members.remove(connection);
            !members.is_empty()
        });
        info!("Unregistered connection {}", connection);
    }

    #[cfg(test)]
    pub(crate) async fn connection_count(&self) -> usize {
        self.inner.read().await.senders.len()
    }

    #[cfg(test)]
    pub(crate) async fn group_members(&self, group: &str) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for ConnectionHub {
    async fn send_to(
        &self,
        connection: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), DeliveryError> {
        let inner = self.inner.read().await;
        let tx = inner
            .senders
            .get(connection)
            .ok_or(DeliveryError::NotAttached(*connection))?;
        tx.send(event.to_json())
            .map(|_| ())
            .map_err(|_| DeliveryError::Closed(*connection))
    }

    async fn send_to_group(
        &self,
        group: &str,
        event: &ServerEvent,
        except: Option<&ConnectionId>,
    ) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.groups.get(group) else {
            return 0;
        };

        let frame = event.to_json();
        members
            .iter()
            .filter(|member| Some(*member) != except)
            .filter_map(|member| inner.senders.get(member))
            .filter(|tx| tx.send(frame.clone()).is_ok())
            .count()
    }

    async fn broadcast(&self, event: &ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let frame = event.to_json();
        inner
            .senders
            .values()
            .filter(|tx| tx.send(frame.clone()).is_ok())
            .count()
    }

    async fn join_group(&self, connection: &ConnectionId, group: &str) {
        let mut inner = self.inner.write().await;
        inner
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(*connection);
        debug!("Connection {} joined group {}", connection, group);
    }

    async fn dissolve_group(&self, group: &str) {
        if self.inner.write().await.groups.remove(group).is_some() {
            debug!("Dissolved group {}", group);
        }
    }
}
