use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::blob::{BlobCategory, BlobStats};
use crate::models::guest::{PresenceStats, PublicGuest};

// Request DTOs
#[derive(Debug, Default, Deserialize)]
pub struct CreateGuestRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadBlobQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ttl_minutes: Option<u32>,
}

// Response DTOs
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestResponse {
    pub user: PublicGuest,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBlobResponse {
    pub id: Uuid,
    pub url: String,
    pub download_url: String,
    pub category: BlobCategory,
    pub mime_type: String,
    pub original_name: String,
    pub size: usize,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StorageStatsResponse {
    pub blobs: BlobStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStatsResponse {
    pub stats: PresenceStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
