use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ChatConfig;
use crate::error::{AppError, Result};
use crate::models::events::{ClientEvent, ServerEvent, SignalFrame};
use crate::models::guest::{ConnectionId, GuestId, GuestSession, GuestUpdate};
use crate::models::room::{guest_group, RoomId};
use crate::services::blob_store::BlobStore;
use crate::services::hub::EventSink;
use crate::services::matching::MatchingEngine;
use crate::services::presence::PresenceStore;
use crate::services::rate_limiter::RateLimiter;
use crate::services::registry::ConnectionRegistry;
use crate::services::relay::{Relay, TeardownReason};
use crate::services::token::TokenService;

/// Admits connections and routes their inbound events.
///
/// All collaborators are passed in, so tests can build isolated gateways.
#[derive(Clone)]
pub struct SessionGateway {
    presence: PresenceStore,
    registry: ConnectionRegistry,
    sink: Arc<dyn EventSink>,
    tokens: TokenService,
    limiter: RateLimiter,
    matching: MatchingEngine,
    relay: Relay,
}

/// Message safe to show a client for a failed operation.
fn client_message(err: &AppError) -> String {
    match err {
        AppError::Internal(_) | AppError::StoreUnavailable(_) | AppError::Config(_) => {
            "Internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl SessionGateway {
    pub fn new(
        presence: PresenceStore,
        registry: ConnectionRegistry,
        blobs: BlobStore,
        sink: Arc<dyn EventSink>,
        tokens: TokenService,
        limiter: RateLimiter,
        chat_limits: ChatConfig,
    ) -> Self {
        let matching = MatchingEngine::new(presence.clone());
        let relay = Relay::new(
            presence.clone(),
            registry.clone(),
            blobs,
            sink.clone(),
            chat_limits,
        );
        Self {
            presence,
            registry,
            sink,
            tokens,
            limiter,
            matching,
            relay,
        }
    }

    /// Resolve a bearer token to the live guest it names. Fails closed.
    pub async fn authenticate(&self, token: &str) -> Result<GuestSession> {
        let claims = self.tokens.parse(token)?;
        let session = self
            .presence
            .get(&claims.guest_id)
            .await?
            .ok_or_else(|| AppError::Authentication("unknown guest session".to_string()))?;

        if !self.tokens.verify(&claims, &session) {
            return Err(AppError::Authentication("invalid token signature".to_string()));
        }
        Ok(session)
    }

    pub async fn on_connect(&self, connection: ConnectionId, token: &str) -> Result<GuestSession> {
        let guest = self.authenticate(token).await?;

        self.registry.bind(connection, guest.id).await;
        let guest = match self
            .presence
            .update(&guest.id, GuestUpdate::online(connection))
            .await
        {
            Ok(Some(guest)) => guest,
            Ok(None) => {
                self.registry.unbind(&connection).await;
                return Err(AppError::GuestNotFound);
            }
            Err(e) => {
                self.registry.unbind(&connection).await;
                return Err(e);
            }
        };

        self.sink.join_group(&connection, &guest_group(&guest.id)).await;
        if let Some(partner) = guest.connected_user {
            // reconnect while paired: rejoin the room's group
            let room_id = RoomId::between(&guest.id, &partner);
            self.sink.join_group(&connection, &room_id.group()).await;
        }

        self.send(
            &connection,
            ServerEvent::ConnectionEstablished {
                user_id: guest.id,
                username: guest.username.clone(),
                socket_id: connection,
                session_id: guest.id,
            },
        )
        .await;

        info!("Guest {} ({}) connected on {}", guest.id, guest.username, connection);
        self.broadcast_stats().await;
        Ok(guest)
    }

    pub async fn on_disconnect(&self, connection: &ConnectionId) {
        let Some(guest_id) = self.registry.guest_for(connection).await else {
            return;
        };

        if let Err(e) = self
            .relay
            .teardown(&guest_id, TeardownReason::PeerDisconnected)
            .await
        {
            warn!("Teardown after disconnect of {} failed: {}", guest_id, e);
        }

        if let Err(e) = self.presence.update(&guest_id, GuestUpdate::offline()).await {
            warn!("Failed to mark guest {} offline: {}", guest_id, e);
        }

        self.registry.unbind(connection).await;
        self.limiter.forget(&guest_id).await;

        info!("Guest {} disconnected from {}", guest_id, connection);
        self.broadcast_stats().await;
    }

    /// Handle one inbound event to completion.
    pub async fn dispatch(&self, connection: &ConnectionId, event: ClientEvent) {
        let Some(guest_id) = self.registry.guest_for(connection).await else {
            self.send(
                connection,
                ServerEvent::Error {
                    message: "Not authenticated".to_string(),
                },
            )
            .await;
            return;
        };

        if !self.limiter.check(&guest_id).await {
            self.send(
                connection,
                ServerEvent::Error {
                    message: AppError::RateLimitExceeded.to_string(),
                },
            )
            .await;
            return;
        }

        match event {
            ClientEvent::Match => self.handle_match(connection, &guest_id).await,
            ClientEvent::CancelMatch => self.handle_cancel(connection, &guest_id).await,
            ClientEvent::ChatMessage(message) => {
                if let Err(e) = self.relay.relay_chat(connection, &guest_id, message).await {
                    self.send(connection, ServerEvent::ChatError { message: client_message(&e) })
                        .await;
                }
            }
            ClientEvent::ChatClear => {
                self.handle_clear(connection, &guest_id, TeardownReason::Cleared).await
            }
            ClientEvent::LeaveRoom => {
                self.handle_clear(connection, &guest_id, TeardownReason::Left).await
            }
            ClientEvent::CloseRoom => {
                self.handle_clear(connection, &guest_id, TeardownReason::Closed).await
            }
            ClientEvent::Offer { offer, call_type } => {
                self.handle_signal(connection, &guest_id, SignalFrame::Offer { offer, call_type })
                    .await
            }
            ClientEvent::Answer { answer } => {
                self.handle_signal(connection, &guest_id, SignalFrame::Answer { answer })
                    .await
            }
            ClientEvent::IceCandidate { candidate } => {
                self.handle_signal(connection, &guest_id, SignalFrame::IceCandidate { candidate })
                    .await
            }
            ClientEvent::CallEnd => {
                self.handle_signal(connection, &guest_id, SignalFrame::CallEnd).await
            }
            ClientEvent::CallReject => {
                self.handle_signal(connection, &guest_id, SignalFrame::CallReject).await
            }
            ClientEvent::CallTimeout => {
                self.handle_signal(connection, &guest_id, SignalFrame::CallTimeout).await
            }
        }
    }

    async fn handle_match(&self, connection: &ConnectionId, guest_id: &GuestId) {
        self.send(connection, ServerEvent::MatchSearching).await;

        let pair = match self.matching.request_match(guest_id).await {
            Ok(pair) => pair,
            Err(AppError::NoCandidates) => {
                self.send(
                    connection,
                    ServerEvent::NoUsers {
                        message: AppError::NoCandidates.to_string(),
                    },
                )
                .await;
                return;
            }
            Err(e) => {
                self.send(connection, ServerEvent::MatchError { message: client_message(&e) })
                    .await;
                return;
            }
        };

        let group = pair.room_id.group();
        self.sink.join_group(connection, &group).await;
        if let Some(partner_connection) = self.registry.connection_for(&pair.partner.id).await {
            self.sink.join_group(&partner_connection, &group).await;
        }

        self.send(
            connection,
            ServerEvent::Matched {
                matched_user: pair.partner.public(),
                room_id: pair.room_id.clone(),
            },
        )
        .await;
        let partner_told = self
            .relay
            .push_to_guest(
                &pair.partner.id,
                &ServerEvent::Matched {
                    matched_user: pair.requester.public(),
                    room_id: pair.room_id.clone(),
                },
            )
            .await;
        if !partner_told {
            warn!("Matched guest {} could not be notified", pair.partner.id);
        }

        self.send(
            connection,
            ServerEvent::UserJoined {
                user_id: pair.partner.id,
                username: pair.partner.username.clone(),
                message: format!("{} joined the chat", pair.partner.username),
            },
        )
        .await;
        self.sink
            .send_to_group(
                &group,
                &ServerEvent::UserJoined {
                    user_id: pair.requester.id,
                    username: pair.requester.username.clone(),
                    message: format!("{} joined the chat", pair.requester.username),
                },
                Some(connection),
            )
            .await;
    }

    async fn handle_cancel(&self, connection: &ConnectionId, guest_id: &GuestId) {
        match self.matching.cancel_match(guest_id).await {
            Ok(()) => self.send(connection, ServerEvent::MatchCancelled).await,
            Err(e) => {
                self.send(connection, ServerEvent::MatchError { message: client_message(&e) })
                    .await
            }
        }
    }

    async fn handle_clear(
        &self,
        connection: &ConnectionId,
        guest_id: &GuestId,
        reason: TeardownReason,
    ) {
        if let Err(e) = self.relay.clear_chat(connection, guest_id, reason).await {
            self.send(connection, ServerEvent::ChatError { message: client_message(&e) })
                .await;
        }
    }

    async fn handle_signal(
        &self,
        connection: &ConnectionId,
        guest_id: &GuestId,
        frame: SignalFrame,
    ) {
        if let Err(e) = self.relay.relay_signal(guest_id, frame).await {
            self.send(connection, ServerEvent::WebrtcError { message: client_message(&e) })
                .await;
        }
    }

    /// Push aggregate presence stats to every connection.
    pub async fn broadcast_stats(&self) {
        let stats = match self.presence.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Failed to compute presence stats: {}", e);
                return;
            }
        };
        let online_users = match self.presence.list_online().await {
            Ok(online) => online.iter().map(GuestSession::public).collect(),
            Err(e) => {
                error!("Failed to list online guests: {}", e);
                return;
            }
        };

        self.sink
            .broadcast(&ServerEvent::RealtimeStats {
                stats,
                online_users,
                timestamp: Utc::now(),
            })
            .await;
    }

    async fn send(&self, connection: &ConnectionId, event: ServerEvent) {
        if let Err(e) = self.sink.send_to(connection, &event).await {
            warn!("Failed to send event to connection {}: {}", connection, e);
        }
    }
}
