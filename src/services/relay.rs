use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::error::{AppError, Result};
use crate::models::events::{
    ChatKind, ChatMessageIn, ChatMessageOut, FileAttachment, ServerEvent, SignalFrame, VoiceNote,
};
use crate::models::guest::{ConnectionId, GuestId, GuestSession, GuestUpdate};
use crate::models::room::{guest_group, RoomId};
use crate::services::blob_store::BlobStore;
use crate::services::hub::EventSink;
use crate::services::presence::PresenceStore;
use crate::services::registry::ConnectionRegistry;

/// Why a pairing was unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Cleared,
    Left,
    Closed,
    PeerDisconnected,
}

impl TeardownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownReason::Cleared => "chat cleared",
            TeardownReason::Left => "partner left",
            TeardownReason::Closed => "room closed",
            TeardownReason::PeerDisconnected => "peer disconnected",
        }
    }
}

/// Forwards chat and signaling frames between the two members of a room.
///
/// Every frame is checked against presence: both guests must name each other
/// as `connected_user`. Failures are returned to the caller, who reports them
/// to the sender only.
#[derive(Clone)]
pub struct Relay {
    presence: PresenceStore,
    registry: ConnectionRegistry,
    blobs: BlobStore,
    sink: Arc<dyn EventSink>,
    limits: ChatConfig,
}

impl Relay {
    pub fn new(
        presence: PresenceStore,
        registry: ConnectionRegistry,
        blobs: BlobStore,
        sink: Arc<dyn EventSink>,
        limits: ChatConfig,
    ) -> Self {
        Self {
            presence,
            registry,
            blobs,
            sink,
            limits,
        }
    }

    /// Sender and partner records, provided they are still paired with each other.
    async fn partnered(&self, sender_id: &GuestId) -> Result<(GuestSession, GuestSession)> {
        let sender = self
            .presence
            .get(sender_id)
            .await?
            .ok_or(AppError::GuestNotFound)?;
        let partner_id = sender.connected_user.ok_or(AppError::NotPartnered)?;

        let partner = self
            .presence
            .get(&partner_id)
            .await?
            .filter(|partner| partner.connected_user == Some(*sender_id))
            .ok_or(AppError::NotPartnered)?;

        Ok((sender, partner))
    }

    async fn partner_connection(&self, partner_id: &GuestId) -> Result<ConnectionId> {
        self.registry
            .connection_for(partner_id)
            .await
            .ok_or(AppError::PartnerUnavailable)
    }

    async fn notify(&self, connection: &ConnectionId, event: &ServerEvent) {
        if let Err(e) = self.sink.send_to(connection, event).await {
            debug!("Dropped notification for connection {}: {}", connection, e);
        }
    }

    /// Best-effort push to a guest wherever it is attached.
    ///
    /// Tries the local registry first, then the guest's private group.
    pub async fn push_to_guest(&self, guest_id: &GuestId, event: &ServerEvent) -> bool {
        if let Some(connection) = self.registry.connection_for(guest_id).await {
            if self.sink.send_to(&connection, event).await.is_ok() {
                return true;
            }
        }
        self.sink.send_to_group(&guest_group(guest_id), event, None).await > 0
    }

    pub async fn relay_chat(
        &self,
        origin: &ConnectionId,
        sender_id: &GuestId,
        message: ChatMessageIn,
    ) -> Result<ChatMessageOut> {
        let (sender, partner) = self.partnered(sender_id).await?;
        let partner_connection = self.partner_connection(&partner.id).await?;
        let room_id = RoomId::between(&sender.id, &partner.id);

        let content = self.validate(&message, &room_id).await?;

        let outgoing = ChatMessageOut {
            id: Uuid::new_v4(),
            sender_id: sender.id,
            sender_username: sender.username,
            kind: message.kind,
            content,
            timestamp: Utc::now(),
        };

        self.notify(
            origin,
            &ServerEvent::ChatMessageSent {
                message_id: outgoing.id,
                timestamp: outgoing.timestamp,
            },
        )
        .await;

        self.sink
            .send_to(&partner_connection, &ServerEvent::ChatMessage(outgoing.clone()))
            .await
            .map_err(|e| {
                warn!("Chat delivery to guest {} failed: {}", partner.id, e);
                AppError::PartnerUnavailable
            })?;

        self.notify(
            origin,
            &ServerEvent::ChatMessageDelivered {
                message_id: outgoing.id,
            },
        )
        .await;

        debug!("Relayed {:?} message {} in room {}", outgoing.kind, outgoing.id, room_id);
        Ok(outgoing)
    }

    /// Forward a signaling frame untouched apart from sender annotation.
    pub async fn relay_signal(&self, sender_id: &GuestId, frame: SignalFrame) -> Result<()> {
        let (sender, partner) = self.partnered(sender_id).await?;
        let partner_connection = self.partner_connection(&partner.id).await?;
        let name = frame.name();

        let event = frame.into_event(sender.id, sender.username);
        self.sink
            .send_to(&partner_connection, &event)
            .await
            .map_err(|e| {
                warn!("Signal {} to guest {} failed: {}", name, partner.id, e);
                AppError::PartnerUnavailable
            })?;

        debug!("Relayed {} from {} to {}", name, sender.id, partner.id);
        Ok(())
    }

    async fn validate(&self, message: &ChatMessageIn, room_id: &RoomId) -> Result<Value> {
        match message.kind {
            ChatKind::Text => {
                let text = message.content.as_str().ok_or_else(|| {
                    AppError::Validation("Text message content must be a string".to_string())
                })?;
                if text.trim().is_empty() {
                    return Err(AppError::Validation("Message cannot be empty".to_string()));
                }
                if text.chars().count() > self.limits.max_text_chars {
                    return Err(AppError::Validation(format!(
                        "Message too long (max {} characters)",
                        self.limits.max_text_chars
                    )));
                }
            }
            ChatKind::File => {
                let file: FileAttachment = serde_json::from_value(message.content.clone())
                    .map_err(|_| {
                        AppError::Validation(
                            "File message requires fileId, fileName, fileSize and mimeType"
                                .to_string(),
                        )
                    })?;
                if file.file_name.trim().is_empty() {
                    return Err(AppError::Validation("File name cannot be empty".to_string()));
                }
                self.check_size(file.file_size)?;
                self.check_attachment(&file.file_id, room_id).await?;
            }
            ChatKind::Voice => {
                let voice: VoiceNote = serde_json::from_value(message.content.clone())
                    .map_err(|_| {
                        AppError::Validation(
                            "Voice message requires fileId, duration and mimeType".to_string(),
                        )
                    })?;
                if !voice.duration.is_finite() || voice.duration <= 0.0 {
                    return Err(AppError::Validation(
                        "Voice note duration must be positive".to_string(),
                    ));
                }
                if let Some(size) = voice.file_size {
                    self.check_size(size)?;
                }
                self.check_attachment(&voice.file_id, room_id).await?;
            }
        }

        Ok(message.content.clone())
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size == 0 || size > self.limits.max_file_bytes {
            return Err(AppError::Validation(format!(
                "Attachment size must be between 1 and {} bytes",
                self.limits.max_file_bytes
            )));
        }
        Ok(())
    }

    async fn check_attachment(&self, blob_id: &Uuid, room_id: &RoomId) -> Result<()> {
        match self.blobs.get(blob_id).await {
            Some(record) if record.room_id == *room_id => Ok(()),
            _ => Err(AppError::Validation("Attachment not found in this room".to_string())),
        }
    }

    /// Tell the partner its room is gone. An explicit clear, leave or close
    /// also carries `chat:cleared`; a dropped connection does not.
    async fn notify_partner(
        &self,
        guest: &GuestSession,
        partner_id: &GuestId,
        reason: TeardownReason,
    ) {
        let mut notices = Vec::with_capacity(3);
        if reason != TeardownReason::PeerDisconnected {
            notices.push(ServerEvent::ChatCleared {
                user_id: guest.id,
                username: guest.username.clone(),
                reason: reason.as_str().to_string(),
            });
        }
        notices.push(ServerEvent::UserLeft {
            user_id: guest.id,
            username: guest.username.clone(),
            message: format!("{} left the chat", guest.username),
        });
        notices.push(ServerEvent::RoomClosed {
            user_id: guest.id,
            username: guest.username.clone(),
            reason: reason.as_str().to_string(),
        });

        for notice in &notices {
            if !self.push_to_guest(partner_id, notice).await {
                warn!("Could not notify guest {} of teardown by {}", partner_id, guest.id);
                break;
            }
        }
    }

    /// Unwind a guest's pairing: notify the partner, clear both sides and purge
    /// the room's blobs.
    ///
    /// Shared by explicit clears and disconnects. Returns the initiator and
    /// former partner, or `None` when the guest was not paired. Partner
    /// notification failures are logged and ignored.
    pub async fn teardown(
        &self,
        guest_id: &GuestId,
        reason: TeardownReason,
    ) -> Result<Option<(GuestSession, GuestId)>> {
        let Some(guest) = self.presence.get(guest_id).await? else {
            return Ok(None);
        };
        let Some(partner_id) = guest.connected_user else {
            return Ok(None);
        };
        let room_id = RoomId::between(guest_id, &partner_id);

        // the partner may have re-paired already; only unwind a pairing with us
        let partner_paired = self
            .presence
            .get(&partner_id)
            .await?
            .is_some_and(|partner| partner.connected_user == Some(*guest_id));

        if partner_paired {
            self.notify_partner(&guest, &partner_id, reason).await;
        } else {
            debug!("Partner {} no longer paired with {}", partner_id, guest_id);
        }

        self.presence.update(guest_id, GuestUpdate::unpaired()).await?;
        if partner_paired {
            self.presence
                .update(&partner_id, GuestUpdate::unpaired())
                .await?;
        }

        let purged = self.blobs.delete_room(&room_id).await;
        self.sink.dissolve_group(&room_id.group()).await;

        info!(
            "Room {} closed by {} ({}), {} blobs purged",
            room_id,
            guest_id,
            reason.as_str(),
            purged
        );
        Ok(Some((guest, partner_id)))
    }

    /// Explicit `chat:clear` / `leave-room` / `close-room` from a guest.
    pub async fn clear_chat(
        &self,
        origin: &ConnectionId,
        guest_id: &GuestId,
        reason: TeardownReason,
    ) -> Result<()> {
        let Some((guest, _partner)) = self.teardown(guest_id, reason).await? else {
            return Err(AppError::NotPartnered);
        };

        self.notify(
            origin,
            &ServerEvent::ChatCleared {
                user_id: guest.id,
                username: guest.username,
                reason: reason.as_str().to_string(),
            },
        )
        .await;
        Ok(())
    }
}
