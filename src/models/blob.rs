use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::room::RoomId;

/// Uploaded payload scoped to one room.
#[derive(Debug, Clone)]
pub struct BlobRecord {
    pub id: Uuid,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub original_name: String,
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BlobRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn category(&self) -> BlobCategory {
        BlobCategory::from_mime(&self.mime_type)
    }
}

/// Display hint derived from the mime type. Not used for access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobCategory {
    Image,
    Video,
    Audio,
    Pdf,
    Text,
    Document,
    Archive,
    Other,
}

impl BlobCategory {
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        let essence = mime.split(';').next().unwrap_or_default().trim();

        match essence {
            m if m.starts_with("image/") => Self::Image,
            m if m.starts_with("video/") => Self::Video,
            m if m.starts_with("audio/") => Self::Audio,
            "application/pdf" => Self::Pdf,
            m if m.starts_with("text/") => Self::Text,
            "application/msword"
            | "application/rtf"
            | "application/vnd.oasis.opendocument.text"
            | "application/vnd.oasis.opendocument.spreadsheet"
            | "application/vnd.ms-excel"
            | "application/vnd.ms-powerpoint" => Self::Document,
            m if m.starts_with("application/vnd.openxmlformats-officedocument") => Self::Document,
            "application/zip"
            | "application/x-zip-compressed"
            | "application/x-rar-compressed"
            | "application/vnd.rar"
            | "application/x-7z-compressed"
            | "application/x-tar"
            | "application/gzip" => Self::Archive,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStats {
    pub count: usize,
    pub room_count: usize,
    pub total_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(BlobCategory::from_mime("image/png"), BlobCategory::Image);
        assert_eq!(BlobCategory::from_mime("video/mp4"), BlobCategory::Video);
        assert_eq!(BlobCategory::from_mime("audio/webm;codecs=opus"), BlobCategory::Audio);
        assert_eq!(BlobCategory::from_mime("application/pdf"), BlobCategory::Pdf);
        assert_eq!(BlobCategory::from_mime("text/plain"), BlobCategory::Text);
        assert_eq!(
            BlobCategory::from_mime(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            BlobCategory::Document
        );
        assert_eq!(BlobCategory::from_mime("application/zip"), BlobCategory::Archive);
        assert_eq!(BlobCategory::from_mime("application/octet-stream"), BlobCategory::Other);
    }
}
