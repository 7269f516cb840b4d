use rand::{rngs::OsRng, seq::SliceRandom};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::guest::{GuestId, GuestSession, GuestUpdate};
use crate::models::room::RoomId;
use crate::services::presence::PresenceStore;

/// Result of a successful pairing, seen from the requester's side.
#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub requester: GuestSession,
    pub partner: GuestSession,
    pub room_id: RoomId,
}

/// Pairs a requester with a uniformly random searching guest.
///
/// No queue and no ordering: every eligible guest has the same chance.
#[derive(Clone)]
pub struct MatchingEngine {
    presence: PresenceStore,
}

impl MatchingEngine {
    pub fn new(presence: PresenceStore) -> Self {
        Self { presence }
    }

    /// Mark the requester searching and try to pair it right away.
    ///
    /// With nobody eligible this fails with `NoCandidates` and the requester
    /// stays searching, so a later requester can still pick it up.
    pub async fn request_match(&self, requester_id: &GuestId) -> Result<MatchedPair> {
        let requester = self
            .presence
            .get(requester_id)
            .await?
            .ok_or(AppError::GuestNotFound)?;
        if requester.connected_user.is_some() {
            return Err(AppError::AlreadyPartnered);
        }

        self.presence
            .update(requester_id, GuestUpdate::searching(true))
            .await?;

        let candidates: Vec<GuestSession> = self
            .presence
            .list_online()
            .await?
            .into_iter()
            .filter(|guest| guest.id != *requester_id && guest.is_available())
            .collect();

        let Some(chosen) = candidates.choose(&mut OsRng).cloned() else {
            info!("No match candidates for guest {}", requester_id);
            return Err(AppError::NoCandidates);
        };

        let Some(partner) = self
            .presence
            .update(&chosen.id, GuestUpdate::paired_with(*requester_id))
            .await?
        else {
            warn!("Match candidate {} vanished before pairing", chosen.id);
            return Err(AppError::NoCandidates);
        };

        let Some(requester) = self
            .presence
            .update(requester_id, GuestUpdate::paired_with(chosen.id))
            .await?
        else {
            // requester expired mid-pairing; put the partner back in the pool
            self.presence
                .update(&chosen.id, GuestUpdate {
                    is_searching: Some(true),
                    connected_user: Some(None),
                    ..Default::default()
                })
                .await?;
            return Err(AppError::GuestNotFound);
        };

        let room_id = RoomId::between(&requester.id, &partner.id);
        info!(
            "Matched {} with {} in room {} ({} candidates)",
            requester.id,
            partner.id,
            room_id,
            candidates.len()
        );

        Ok(MatchedPair {
            requester,
            partner,
            room_id,
        })
    }

    /// Stop searching. Idempotent and leaves an existing pairing untouched.
    pub async fn cancel_match(&self, guest_id: &GuestId) -> Result<()> {
        let Some(guest) = self.presence.get(guest_id).await? else {
            return Err(AppError::GuestNotFound);
        };
        if guest.connected_user.is_none() && guest.is_searching {
            self.presence
                .update(guest_id, GuestUpdate::searching(false))
                .await?;
            info!("Guest {} stopped searching", guest_id);
        }
        Ok(())
    }
}
