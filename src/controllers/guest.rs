use crate::error::{AppError, Result};
use crate::models::api::{CreateGuestRequest, CreateGuestResponse};
use crate::models::guest::GuestProfile;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use tracing::info;

/// Create an anonymous guest and hand back its bearer token.
///
/// The body is optional; an empty body gets a generated username.
pub async fn create_guest(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateGuestResponse>)> {
    let req: CreateGuestRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateGuestRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let guest = state
        .presence
        .create(GuestProfile {
            username: req.username,
            location: req.location,
            gender: req.gender,
            language: req.language,
        })
        .await?;
    let (token, expires_at) = state.tokens.issue(&guest)?;

    info!("Created guest {} ({})", guest.id, guest.username);

    Ok((
        StatusCode::CREATED,
        Json(CreateGuestResponse {
            user: guest.public(),
            token,
            expires_at,
        }),
    ))
}
