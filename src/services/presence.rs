use crate::error::{AppError, Result};
use crate::models::guest::{
    is_valid_username, GuestId, GuestProfile, GuestSession, GuestUpdate, PresenceStats,
};
use crate::services::presence_backend::PresenceBackend;
use crate::services::username::UsernameGenerator;
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Guest presence records with a sliding inactivity TTL.
///
/// Updates are read-modify-write over whole records with no concurrency
/// control: concurrent writers to the same guest race and the last write wins.
#[derive(Clone)]
pub struct PresenceStore {
    backend: Arc<dyn PresenceBackend>,
    ttl: Duration,
}

impl PresenceStore {
    const KEY_PREFIX: &'static str = "presence:";

    pub fn new(backend: Arc<dyn PresenceBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    fn key(id: &GuestId) -> String {
        format!("{}{}", Self::KEY_PREFIX, id)
    }

    fn new_session_token() -> String {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        hex::encode(secret)
    }

    async fn save(&self, session: &GuestSession) -> Result<()> {
        let json = serde_json::to_string(session)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Serialization error: {}", e)))?;
        self.backend.put(&Self::key(&session.id), json, self.ttl).await?;
        Ok(())
    }

    /// Create a guest, generating a display name when none is given.
    pub async fn create(&self, profile: GuestProfile) -> Result<GuestSession> {
        let username = match profile.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                if !is_valid_username(name) {
                    return Err(AppError::Validation(
                        "Username must be 3-20 letters, digits or underscores".to_string(),
                    ));
                }
                name.to_string()
            }
            _ => UsernameGenerator::generate(),
        };

        let session =
            GuestSession::new(Uuid::new_v4(), Self::new_session_token(), username, profile);
        self.save(&session).await?;

        info!("Created guest {} ({})", session.id, session.username);
        Ok(session)
    }

    pub async fn get(&self, id: &GuestId) -> Result<Option<GuestSession>> {
        let json = self.backend.fetch(&Self::key(id)).await?;
        match json {
            Some(json) => {
                let session: GuestSession = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Deserialization error: {}", e))
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Apply a partial update and refresh the TTL. `None` when the guest is gone.
    pub async fn update(&self, id: &GuestId, update: GuestUpdate) -> Result<Option<GuestSession>> {
        let Some(mut session) = self.get(id).await? else {
            debug!("Presence update for unknown guest {}", id);
            return Ok(None);
        };

        session.apply(update);
        self.save(&session).await?;
        Ok(Some(session))
    }

    pub async fn remove(&self, id: &GuestId) -> Result<()> {
        self.backend.delete(&Self::key(id)).await?;
        info!("Removed guest {}", id);
        Ok(())
    }

    /// Every stored guest across both storage backends, one entry per id.
    pub async fn list_all(&self) -> Result<Vec<GuestSession>> {
        let entries = self.backend.scan(Self::KEY_PREFIX).await?;
        let mut by_id: HashMap<GuestId, GuestSession> = HashMap::with_capacity(entries.len());

        for (key, json) in entries {
            match serde_json::from_str::<GuestSession>(&json) {
                Ok(session) => {
                    by_id.insert(session.id, session);
                }
                Err(e) => debug!("Skipping unreadable presence record {}: {}", key, e),
            }
        }

        Ok(by_id.into_values().collect())
    }

    pub async fn list_online(&self) -> Result<Vec<GuestSession>> {
        let mut online: Vec<GuestSession> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|session| session.is_online)
            .collect();
        online.sort_by_key(|session| session.created_at);
        Ok(online)
    }

    pub async fn stats(&self) -> Result<PresenceStats> {
        let all = self.list_all().await?;
        let online = all.iter().filter(|s| s.is_online).count();
        let searching = all.iter().filter(|s| s.is_online && s.is_searching).count();
        // every pairing is recorded on both sides
        let connected = all.iter().filter(|s| s.connected_user.is_some()).count();

        Ok(PresenceStats {
            total: all.len(),
            online,
            searching,
            connected_pairs: connected / 2,
        })
    }
}
