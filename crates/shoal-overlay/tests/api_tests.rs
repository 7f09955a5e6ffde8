//! Integration tests for the overlay API endpoints.
//!
//! Requests go through the `Router` via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use shoal_overlay::router::build_router;
use shoal_overlay::server::{ServerConfig, ServerError, spawn_server};
use shoal_overlay::state::OverlayState;
use shoal_types::{
    ConnectionState, DecorationId, DecorationPlacement, DepthLayer, DockPosition, EntityView,
    Facing, LifecycleStage, Point, SceneFrame, SkinId, ViewerKey,
};
use tower::ServiceExt;

fn frame(tick: u64) -> SceneFrame {
    SceneFrame {
        tick,
        now_ms: 1_000,
        connection: ConnectionState::Connected,
        dock: DockPosition::Bottom,
        config_version: Some(4),
        entities: vec![EntityView {
            identity: ViewerKey::new("nemo"),
            display_name: String::from("Nemo"),
            skin: SkinId::new("clownfish"),
            position: Point::new(40.0, 70.0),
            facing: Facing::Right,
            stage: LifecycleStage::Active,
            claimed_by: None,
            frozen: false,
            speech: Some(String::from("hello")),
        }],
        events: Vec::new(),
        effects: Vec::new(),
    }
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(state: &Arc<OverlayState>, path: &str) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state))
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

#[tokio::test]
async fn test_health() {
    let state = Arc::new(OverlayState::new());
    let (status, json) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_frame_not_found_before_first_tick() {
    let state = Arc::new(OverlayState::new());
    let (status, json) = get(&state, "/api/frame").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_frame_serves_latest_in_camel_case() {
    let state = Arc::new(OverlayState::new());
    state.publish_frame(&frame(1));
    state.publish_frame(&frame(2));

    let (status, json) = get(&state, "/api/frame").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tick"], 2);
    assert_eq!(json["configVersion"], 4);
    assert_eq!(json["connection"], "connected");
    let entity = &json["entities"][0];
    assert_eq!(entity["identity"], "nemo");
    assert_eq!(entity["displayName"], "Nemo");
    assert_eq!(entity["speech"], "hello");
}

#[tokio::test]
async fn test_layout_starts_empty_and_follows_updates() {
    let state = Arc::new(OverlayState::new());
    let (status, json) = get(&state, "/api/layout").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, Value::Array(Vec::new()));

    state.set_layout(vec![DecorationPlacement {
        asset_id: DecorationId::new("castle"),
        horizontal_percent: 50.0,
        size_px: 170,
        depth_layer: DepthLayer::Back,
    }]);
    let (_, json) = get(&state, "/api/layout").await;
    assert_eq!(json[0]["assetId"], "castle");
    assert_eq!(json[0]["sizePx"], 170);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let state = Arc::new(OverlayState::new());
    let response = build_router(state)
        .oneshot(Request::get("/api/agents").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_spawn_server_binds_ephemeral_port() {
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let (addr, handle) = spawn_server(&config, Arc::new(OverlayState::new())).await.unwrap();
    assert_ne!(addr.port(), 0);
    handle.abort();
}

#[tokio::test]
async fn test_spawn_server_rejects_bad_address() {
    let config = ServerConfig {
        host: String::from("not an address"),
        port: 8090,
    };
    let result = spawn_server(&config, Arc::new(OverlayState::new())).await;
    assert!(matches!(result, Err(ServerError::Address { .. })));
}
