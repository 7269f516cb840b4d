// REST surface exercised through the router without a listener.

use crate::common::test_state;
use anonchat_relay::{models::guest::GuestUpdate, routes::create_router, state::AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn create_guest(app: &Router, body: &str) -> Value {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/guest")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = call(app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    serde_json::from_slice(&body).unwrap()
}

fn upload(token: &str, name: &str, bytes: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/api/blobs?name={}", name))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(bytes))
        .unwrap()
}

async fn pair(state: &AppState, a: &Value, b: &Value) {
    let a: Uuid = a["user"]["id"].as_str().unwrap().parse().unwrap();
    let b: Uuid = b["user"]["id"].as_str().unwrap().parse().unwrap();
    state.presence.update(&a, GuestUpdate::paired_with(b)).await.unwrap();
    state.presence.update(&b, GuestUpdate::paired_with(a)).await.unwrap();
}

#[tokio::test]
async fn test_health() {
    let app = create_router(test_state());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_guest_with_and_without_profile() {
    let app = create_router(test_state());

    let named = create_guest(&app, r#"{"username":"night_owl","language":"en"}"#).await;
    assert_eq!(named["user"]["username"], "night_owl");
    assert_eq!(named["user"]["language"], "en");
    assert_eq!(named["token"].as_str().unwrap().split('.').count(), 3);
    assert!(named["expiresAt"].is_string());

    let anonymous = create_guest(&app, "").await;
    assert!(!anonymous["user"]["username"].as_str().unwrap().is_empty());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/guest")
        .body(Body::from(r#"{"username":"no spaces allowed"}"#))
        .unwrap();
    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_requires_token_and_room() {
    let app = create_router(test_state());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/blobs")
        .body(Body::from("data"))
        .unwrap();
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], 401);

    let guest = create_guest(&app, "").await;
    let (status, _) = call(&app, upload(guest["token"].as_str().unwrap(), "a.txt", b"data")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_upload_then_fetch_inline_and_download() {
    let state = test_state();
    let app = create_router(state.clone());
    let alice = create_guest(&app, "").await;
    let bob = create_guest(&app, "").await;
    pair(&state, &alice, &bob).await;

    let token = alice["token"].as_str().unwrap();
    let (status, body) = call(&app, upload(token, "notes.txt", b"hello")).await;
    assert_eq!(status, StatusCode::CREATED);
    let uploaded: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(uploaded["category"], "text");
    assert_eq!(uploaded["size"], 5);
    let url = uploaded["url"].as_str().unwrap().to_string();
    let download_url = uploaded["downloadUrl"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello");

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&download_url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\""
    );

    let (_, body) = call(
        &app,
        Request::builder().uri("/api/storage/stats").body(Body::empty()).unwrap(),
    )
    .await;
    let stats: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["blobs"]["count"], 1);
}

#[tokio::test]
async fn test_unknown_blob_is_not_found() {
    let app = create_router(test_state());
    let request = Request::builder()
        .uri(format!("/api/blobs/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_presence_stats_endpoint() {
    let app = create_router(test_state());
    create_guest(&app, "").await;

    let request = Request::builder().uri("/api/stats").body(Body::empty()).unwrap();
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["stats"]["total"], 1);
    assert_eq!(body["stats"]["online"], 0);
}

#[tokio::test]
async fn test_upload_accepts_percent_encoded_query_token() {
    let state = test_state();
    let app = create_router(state.clone());
    let alice = create_guest(&app, "").await;
    let bob = create_guest(&app, "").await;
    pair(&state, &alice, &bob).await;

    let encoded = alice["token"].as_str().unwrap().replace('.', "%2E");
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/blobs?name=a.txt&token={}", encoded))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("data"))
        .unwrap();

    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
}
