use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type GuestId = Uuid;
pub type ConnectionId = Uuid;

/// Stored presence record for one anonymous guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSession {
    pub id: GuestId,
    /// Per-session secret folded into the bearer token signature
    pub session_token: String,
    pub username: String,
    pub is_online: bool,
    pub is_searching: bool,
    pub connected_user: Option<GuestId>,
    /// Live connection currently attached to this guest, if any
    pub socket_id: Option<ConnectionId>,
    pub location: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Optional profile supplied when a guest session is created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestProfile {
    pub username: Option<String>,
    pub location: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
}

/// Partial update applied read-modify-write; last write wins.
///
/// `connected_user` and `socket_id` are doubly optional: `None` leaves the
/// field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct GuestUpdate {
    pub is_online: Option<bool>,
    pub is_searching: Option<bool>,
    pub connected_user: Option<Option<GuestId>>,
    pub socket_id: Option<Option<ConnectionId>>,
    pub location: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
}

impl GuestUpdate {
    pub fn online(socket_id: ConnectionId) -> Self {
        Self {
            is_online: Some(true),
            socket_id: Some(Some(socket_id)),
            ..Default::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            is_online: Some(false),
            is_searching: Some(false),
            socket_id: Some(None),
            ..Default::default()
        }
    }

    pub fn searching(is_searching: bool) -> Self {
        Self {
            is_searching: Some(is_searching),
            ..Default::default()
        }
    }

    pub fn paired_with(partner: GuestId) -> Self {
        Self {
            is_searching: Some(false),
            connected_user: Some(Some(partner)),
            ..Default::default()
        }
    }

    pub fn unpaired() -> Self {
        Self {
            is_searching: Some(false),
            connected_user: Some(None),
            ..Default::default()
        }
    }
}

impl GuestSession {
    pub fn new(
        id: GuestId,
        session_token: String,
        username: String,
        profile: GuestProfile,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_token,
            username,
            is_online: false,
            is_searching: false,
            connected_user: None,
            socket_id: None,
            location: profile.location,
            gender: profile.gender,
            language: profile.language,
            last_seen: now,
            created_at: now,
        }
    }

    /// Apply a partial update, keeping searching and paired mutually exclusive.
    pub fn apply(&mut self, update: GuestUpdate) {
        if let Some(online) = update.is_online {
            self.is_online = online;
        }
        if let Some(searching) = update.is_searching {
            self.is_searching = searching;
        }
        if let Some(partner) = update.connected_user {
            self.connected_user = partner;
        }
        if let Some(socket) = update.socket_id {
            self.socket_id = socket;
        }
        if update.location.is_some() {
            self.location = update.location;
        }
        if update.gender.is_some() {
            self.gender = update.gender;
        }
        if update.language.is_some() {
            self.language = update.language;
        }

        if self.connected_user.is_some() {
            self.is_searching = false;
        }
        self.last_seen = Utc::now();
    }

    /// Eligible as a match candidate for someone else.
    pub fn is_available(&self) -> bool {
        self.is_online && self.is_searching && self.connected_user.is_none()
    }

    pub fn public(&self) -> PublicGuest {
        PublicGuest {
            id: self.id,
            username: self.username.clone(),
            location: self.location.clone(),
            gender: self.gender.clone(),
            language: self.language.clone(),
            is_online: self.is_online,
        }
    }
}

/// Guest fields safe to show to other guests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicGuest {
    pub id: GuestId,
    pub username: String,
    pub location: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub is_online: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStats {
    pub total: usize,
    pub online: usize,
    pub searching: usize,
    pub connected_pairs: usize,
}

/// Usernames are 3-20 characters of letters, digits or underscore.
pub fn is_valid_username(name: &str) -> bool {
    (3..=20).contains(&name.chars().count())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
