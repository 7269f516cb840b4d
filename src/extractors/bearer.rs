use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::guest::GuestSession;
use crate::state::AppState;

/// Token from `Authorization: Bearer ...`, else from a `token` query value.
pub fn bearer_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    from_header
        .or_else(|| query_token.map(str::trim).filter(|token| !token.is_empty()))
        .map(str::to_string)
}

/// `?token=...` on REST calls and the websocket upgrade.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Live guest resolved from the request's bearer token.
pub struct AuthenticatedGuest(pub GuestSession);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedGuest {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::BadRequest(format!("Invalid query string: {}", e)))?;
        let token = bearer_token(&parts.headers, query.token.as_deref())
            .ok_or_else(|| AppError::Authentication("missing bearer token".to_string()))?;
        let guest = state.gateway.authenticate(&token).await?;
        Ok(AuthenticatedGuest(guest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.1.sig"));
        assert_eq!(bearer_token(&headers, Some("other")).as_deref(), Some("abc.1.sig"));
    }

    #[test]
    fn test_query_fallback_and_blank_values() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers, Some("q.1.s")).as_deref(), Some("q.1.s"));
        assert_eq!(bearer_token(&headers, Some("  ")), None);
        assert_eq!(bearer_token(&headers, None), None);

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&basic, None), None);
    }

    fn token_from(uri: &str) -> Option<String> {
        let uri: axum::http::Uri = uri.parse().unwrap();
        let Query(query) = Query::<TokenQuery>::try_from_uri(&uri).unwrap();
        query.token
    }

    #[test]
    fn test_query_token_is_percent_decoded() {
        assert_eq!(token_from("/api/blobs?name=a&token=t.2.x").as_deref(), Some("t.2.x"));
        assert_eq!(token_from("/api/blobs?token=t%2E2%2Ex").as_deref(), Some("t.2.x"));
        assert_eq!(token_from("/api/blobs?name=a"), None);
        assert_eq!(token_from("/api/blobs"), None);
    }
}
