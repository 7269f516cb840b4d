use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::guest::{GuestId, GuestSession};

pub type HmacKey = Hmac<Sha256>;

/// Fields carried in the clear by a guest bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub guest_id: GuestId,
    pub expires_at: DateTime<Utc>,
    signature: Vec<u8>,
}

/// Mints and checks `{guestId}.{expiresAt}.{mac}` bearer tokens.
///
/// The MAC covers the guest's per-session secret, so a token only verifies
/// against the exact presence record it was issued for.
#[derive(Clone)]
pub struct TokenService {
    key_bytes: Arc<Vec<u8>>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(master_key: &str, ttl: Duration) -> Self {
        Self {
            key_bytes: Arc::new(master_key.as_bytes().to_vec()),
            ttl,
        }
    }

    fn mac(&self, guest_id: &GuestId, expires_at: i64, session_token: &str) -> Result<Vec<u8>> {
        let mut mac = HmacKey::new_from_slice(&self.key_bytes)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid HMAC key: {}", e)))?;
        mac.update(format!("{}.{}.{}", guest_id, expires_at, session_token).as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    pub fn issue(&self, session: &GuestSession) -> Result<(String, DateTime<Utc>)> {
        let ttl = ChronoDuration::from_std(self.ttl)
            .map_err(|e| AppError::Config(format!("token ttl out of range: {}", e)))?;
        let expires_at = Utc::now() + ttl;
        let timestamp = expires_at.timestamp();
        let signature = self.mac(&session.id, timestamp, &session.session_token)?;

        let token = format!(
            "{}.{}.{}",
            session.id,
            timestamp,
            URL_SAFE_NO_PAD.encode(signature)
        );
        Ok((token, expires_at))
    }

    /// Check structure and expiry. The signature is checked by [`Self::verify`].
    pub fn parse(&self, token: &str) -> Result<TokenClaims> {
        let malformed = || AppError::Authentication("malformed token".to_string());

        let mut parts = token.trim().splitn(3, '.');
        let (Some(id), Some(expires), Some(signature)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let guest_id = Uuid::parse_str(id).map_err(|_| malformed())?;
        let expires_at = expires
            .parse::<i64>()
            .ok()
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .ok_or_else(malformed)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| malformed())?;

        if expires_at <= Utc::now() {
            return Err(AppError::Authentication("token expired".to_string()));
        }

        Ok(TokenClaims {
            guest_id,
            expires_at,
            signature,
        })
    }

    pub fn verify(&self, claims: &TokenClaims, session: &GuestSession) -> bool {
        if claims.guest_id != session.id {
            return false;
        }
        match self.mac(&session.id, claims.expires_at.timestamp(), &session.session_token) {
            Ok(expected) => expected.ct_eq(&claims.signature).into(),
            Err(_) => false,
        }
    }
}
