use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::{TimeDelta, Utc};
use hugo_poster::router::{BotHttpState, bot_router};
use hugo_poster::service::bot::{BotFault, BotState, BotStatus};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

async fn get_health(state: BotState) -> (StatusCode, Value) {
    let shared = Arc::new(RwLock::new(state));
    let app = bot_router(BotHttpState::new(shared, TimeDelta::seconds(7200)));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let json = serde_json::from_slice(&body).expect("response body was not json");
    (status, json)
}

#[tokio::test]
async fn healthy_bot_reports_ok_with_token_estimate() {
    let mut state = BotState::new();
    state.status = BotStatus::Idle;
    state.bot_user_id = Some("4242".to_string());
    state.last_refresh_time = Some(Utc::now() - TimeDelta::minutes(10));
    state.last_post_time = Some(Utc::now() - TimeDelta::hours(3));

    let (status, body) = get_health(state).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["bot_status"], "Idle");
    assert_eq!(body["bot_user_id"], "4242");
    assert_eq!(body["access_token_status"], "Likely Valid");
    let left = body["access_token_estimated_time_left_secs"]
        .as_i64()
        .expect("time left present");
    assert!(left > 6000 && left <= 6600);
    assert!(body["last_error"].is_null());
}

#[tokio::test]
async fn halted_bot_reports_error_and_reason() {
    let mut state = BotState::new();
    state.status = BotStatus::Halted(BotFault::RefreshTokenRevoked);
    state.last_error = Some(BotFault::RefreshTokenRevoked.to_string());

    let (status, body) = get_health(state).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Error");
    assert!(
        body["bot_status"]
            .as_str()
            .is_some_and(|s| s.starts_with("Error:"))
    );
    assert_eq!(body["access_token_status"], "Unknown");
    assert!(body["last_error"].as_str().is_some_and(|e| e.contains("revoked")));
}
