use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::guest::{ConnectionId, GuestId, PresenceStats, PublicGuest};
use crate::models::room::RoomId;

/// Frames sent by a client over its WebSocket.
///
/// Wire shape: `{"event": "<name>", "data": {...}}`. Events without a
/// payload accept `data` that is absent, `null` or `{}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(remote = "Self", tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "user:match")]
    Match,
    #[serde(rename = "user:match:cancel")]
    CancelMatch,
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessageIn),
    #[serde(rename = "chat:clear")]
    ChatClear,
    #[serde(rename = "leave-room")]
    LeaveRoom,
    #[serde(rename = "close-room")]
    CloseRoom,
    #[serde(rename = "webrtc:offer")]
    Offer {
        offer: Value,
        #[serde(rename = "type", default)]
        call_type: CallType,
    },
    #[serde(rename = "webrtc:answer")]
    Answer { answer: Value },
    #[serde(rename = "webrtc:ice-candidate")]
    IceCandidate { candidate: Value },
    #[serde(rename = "webrtc:call-end")]
    CallEnd,
    #[serde(rename = "webrtc:call-reject")]
    CallReject,
    #[serde(rename = "webrtc:call-timeout")]
    CallTimeout,
}

impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut envelope = Map::<String, Value>::deserialize(deserializer)?;
        if matches!(envelope.get("data"), Some(Value::Object(data)) if data.is_empty()) {
            envelope.remove("data");
        }
        ClientEvent::deserialize(Value::Object(envelope)).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    #[default]
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Text,
    File,
    Voice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageIn {
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub content: Value,
    /// Client clock; informational only
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Metadata a `file` chat message must carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub file_id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Metadata a `voice` chat message must carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceNote {
    pub file_id: Uuid,
    /// Seconds
    pub duration: f64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageOut {
    pub id: Uuid,
    pub sender_id: GuestId,
    pub sender_username: String,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
}

/// Signaling frames the relay forwards without interpreting.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalFrame {
    Offer { offer: Value, call_type: CallType },
    Answer { answer: Value },
    IceCandidate { candidate: Value },
    CallEnd,
    CallReject,
    CallTimeout,
}

impl SignalFrame {
    pub fn name(&self) -> &'static str {
        match self {
            SignalFrame::Offer { .. } => "webrtc:offer",
            SignalFrame::Answer { .. } => "webrtc:answer",
            SignalFrame::IceCandidate { .. } => "webrtc:ice-candidate",
            SignalFrame::CallEnd => "webrtc:call-end",
            SignalFrame::CallReject => "webrtc:call-reject",
            SignalFrame::CallTimeout => "webrtc:call-timeout",
        }
    }

    /// Annotate the frame with its sender for delivery to the partner.
    pub fn into_event(self, from: GuestId, from_username: String) -> ServerEvent {
        match self {
            SignalFrame::Offer { offer, call_type } => ServerEvent::Offer {
                offer,
                call_type,
                from,
                from_username,
            },
            SignalFrame::Answer { answer } => ServerEvent::Answer {
                answer,
                from,
                from_username,
            },
            SignalFrame::IceCandidate { candidate } => ServerEvent::IceCandidate {
                candidate,
                from,
                from_username,
            },
            SignalFrame::CallEnd => ServerEvent::CallEnd { from, from_username },
            SignalFrame::CallReject => ServerEvent::CallReject { from, from_username },
            SignalFrame::CallTimeout => ServerEvent::CallTimeout { from, from_username },
        }
    }
}

/// Frames pushed by the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connection:established", rename_all = "camelCase")]
    ConnectionEstablished {
        user_id: GuestId,
        username: String,
        socket_id: ConnectionId,
        session_id: GuestId,
    },
    #[serde(rename = "user:match:searching")]
    MatchSearching,
    #[serde(rename = "user:matched", rename_all = "camelCase")]
    Matched {
        matched_user: PublicGuest,
        room_id: RoomId,
    },
    #[serde(rename = "user:match:no_users")]
    NoUsers { message: String },
    #[serde(rename = "user:match:error")]
    MatchError { message: String },
    #[serde(rename = "user:match:cancelled")]
    MatchCancelled,
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessageOut),
    #[serde(rename = "chat:message:sent", rename_all = "camelCase")]
    ChatMessageSent {
        message_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "chat:message:delivered", rename_all = "camelCase")]
    ChatMessageDelivered { message_id: Uuid },
    #[serde(rename = "chat:error")]
    ChatError { message: String },
    #[serde(rename = "chat:cleared", rename_all = "camelCase")]
    ChatCleared {
        user_id: GuestId,
        username: String,
        reason: String,
    },
    #[serde(rename = "room:closed", rename_all = "camelCase")]
    RoomClosed {
        user_id: GuestId,
        username: String,
        reason: String,
    },
    #[serde(rename = "room:user_joined", rename_all = "camelCase")]
    UserJoined {
        user_id: GuestId,
        username: String,
        message: String,
    },
    #[serde(rename = "room:user_left", rename_all = "camelCase")]
    UserLeft {
        user_id: GuestId,
        username: String,
        message: String,
    },
    #[serde(rename = "webrtc:offer", rename_all = "camelCase")]
    Offer {
        offer: Value,
        #[serde(rename = "type")]
        call_type: CallType,
        from: GuestId,
        from_username: String,
    },
    #[serde(rename = "webrtc:answer", rename_all = "camelCase")]
    Answer {
        answer: Value,
        from: GuestId,
        from_username: String,
    },
    #[serde(rename = "webrtc:ice-candidate", rename_all = "camelCase")]
    IceCandidate {
        candidate: Value,
        from: GuestId,
        from_username: String,
    },
    #[serde(rename = "webrtc:call-end", rename_all = "camelCase")]
    CallEnd { from: GuestId, from_username: String },
    #[serde(rename = "webrtc:call-reject", rename_all = "camelCase")]
    CallReject { from: GuestId, from_username: String },
    #[serde(rename = "webrtc:call-timeout", rename_all = "camelCase")]
    CallTimeout { from: GuestId, from_username: String },
    #[serde(rename = "webrtc:error")]
    WebrtcError { message: String },
    #[serde(rename = "realtime:stats", rename_all = "camelCase")]
    RealtimeStats {
        stats: PresenceStats,
        online_users: Vec<PublicGuest>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        // Every variant holds plain data; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize server event: {}", e);
            r#"{"event":"error","data":{"message":"Internal error"}}"#.to_string()
        })
    }
}
