use crate::error::{AppError, Result};
use crate::extractors::AuthenticatedGuest;
use crate::models::api::{StorageStatsResponse, UploadBlobQuery, UploadBlobResponse};
use crate::models::blob::BlobRecord;
use crate::models::room::RoomId;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;
use uuid::Uuid;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Store a raw upload in the caller's current room.
pub async fn upload_blob(
    State(state): State<AppState>,
    AuthenticatedGuest(guest): AuthenticatedGuest,
    Query(query): Query<UploadBlobQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadBlobResponse>)> {
    let partner = guest.connected_user.ok_or(AppError::NotPartnered)?;
    let room_id = RoomId::between(&guest.id, &partner);

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();
    let name = query
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "upload".to_string());
    let max_ttl = state.config.blobs.default_ttl_minutes;
    let ttl_minutes = query.ttl_minutes.unwrap_or(max_ttl).min(max_ttl).max(1);

    let id = state
        .blobs
        .put(body.to_vec(), mime_type, name, &room_id, ttl_minutes)
        .await?;
    let record = state.blobs.get(&id).await.ok_or(AppError::BlobNotFound(id))?;

    info!(
        "Guest {} uploaded blob {} ({} bytes) to room {}",
        guest.id,
        id,
        record.bytes.len(),
        room_id
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadBlobResponse {
            id,
            url: format!("/api/blobs/{}", id),
            download_url: format!("/api/blobs/{}/download", id),
            category: record.category(),
            mime_type: record.mime_type,
            original_name: record.original_name,
            size: record.bytes.len(),
            expires_at: record.expires_at,
        }),
    ))
}

pub async fn get_blob(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let record = state.blobs.get(&id).await.ok_or(AppError::BlobNotFound(id))?;
    Ok(blob_response(record, "inline"))
}

pub async fn download_blob(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let record = state.blobs.get(&id).await.ok_or(AppError::BlobNotFound(id))?;
    Ok(blob_response(record, "attachment"))
}

pub async fn storage_stats(State(state): State<AppState>) -> Json<StorageStatsResponse> {
    Json(StorageStatsResponse {
        blobs: state.blobs.stats().await,
    })
}

fn blob_response(record: BlobRecord, disposition: &str) -> Response {
    let content_type = HeaderValue::from_str(&record.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_MIME));
    // quotes and control characters cannot appear inside the quoted filename
    let safe_name: String = record
        .original_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    let content_disposition =
        HeaderValue::from_str(&format!("{}; filename=\"{}\"", disposition, safe_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        record.bytes,
    )
        .into_response()
}
