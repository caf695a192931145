//! Integration tests for [`HubClient`] against a mock hub.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use meshly_api::{ApiError, HubClient, HubErrorCode};

async fn client_for(server: &MockServer) -> HubClient {
    let base = server.uri().parse().unwrap();
    HubClient::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn control_posts_brightness_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/control"))
        .and(body_json(serde_json::json!({"avion_id": 7, "brightness": 255})))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.set_brightness(7, 255).await.unwrap();
}

#[tokio::test]
async fn control_posts_color_temp_without_brightness() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/control"))
        .and(body_json(serde_json::json!({"avion_id": 3, "color_temp": 2700})))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.set_color_temp(3, 2700).await.unwrap();
}

#[tokio::test]
async fn mesh_not_initialized_maps_to_typed_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/discover_mesh"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string(r#"{"error":"mesh_not_initialized"}"#),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.discover_mesh().await.unwrap_err();
    match err {
        ApiError::Hub { ref code, status } => {
            assert_eq!(*code, HubErrorCode::MeshNotInitialized);
            assert_eq!(status, 503);
        }
        ref other => panic!("expected Hub error, got {other:?}"),
    }
    // The mapped message is what the UI shows.
    assert!(err.to_string().contains("passphrase"));
}

#[tokio::test]
async fn busy_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan_unassociated"))
        .respond_with(ResponseTemplate::new(409).set_body_string(r#"{"error":"busy"}"#))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.scan_unassociated().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/save"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.save().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Hub { code: HubErrorCode::Other(_), status: 500 }
    ));
}

#[tokio::test]
async fn claim_sends_numeric_uuid_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/claim_device"))
        .and(body_json(serde_json::json!({
            "uuid_hash": 0x00c0_ffee_u32,
            "name": "Hall Sconce",
            "product_type": 134
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"started"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.claim_device(0x00c0_ffee, "Hall Sconce", 134).await.unwrap();
}

#[tokio::test]
async fn generate_passphrase_parses_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate_passphrase"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"passphrase":"c2VjcmV0LXNlY3JldC0xNg=="}"#),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let pp = client.generate_passphrase().await.unwrap();
    assert_eq!(pp, "c2VjcmV0LXNlY3JldC0xNg==");
}

#[tokio::test]
async fn events_url_joins_base() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    let url = client.events_url().unwrap();
    assert!(url.as_str().ends_with("/api/events"));
}
