#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hugo_poster::config::Config;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;
use url::Url;

pub const BOT_USER_ID: &str = "4242";
pub const NEW_POST_ID: &str = "9001";
pub const REDIRECT_URI: &str = "https://bot.example.com/callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Rotate,
    Revoked,
    Unavailable,
}

/// In-process stand-in for the X API, its token endpoint and the chat
/// completions endpoint. Records what the bot sent.
pub struct MockUpstream {
    pub valid_tokens: Mutex<Vec<String>>,
    pub refresh_mode: Mutex<RefreshMode>,
    pub last_post_created_at: Mutex<Option<String>>,
    pub completion: Mutex<String>,
    pub posts: Mutex<Vec<(String, String)>>,
    pub likes: Mutex<Vec<(String, String)>>,
    pub token_requests: Mutex<Vec<HashMap<String, String>>>,
    pub refresh_delay: Mutex<Duration>,
    /// When false, issued access tokens are rejected by `/users/me`.
    pub accept_issued: Mutex<bool>,
    pub post_failure: Mutex<Option<StatusCode>>,
    pub already_liked: Mutex<bool>,
}

impl MockUpstream {
    pub fn new(valid_tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            valid_tokens: Mutex::new(valid_tokens.iter().map(|t| t.to_string()).collect()),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            last_post_created_at: Mutex::new(None),
            completion: Mutex::new(
                "1. meh\n2. fine\n<final_tweet>\n\"Ship small things daily.\"\n</final_tweet>"
                    .to_string(),
            ),
            posts: Mutex::new(Vec::new()),
            likes: Mutex::new(Vec::new()),
            token_requests: Mutex::new(Vec::new()),
            refresh_delay: Mutex::new(Duration::ZERO),
            accept_issued: Mutex::new(true),
            post_failure: Mutex::new(None),
            already_liked: Mutex::new(false),
        })
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_last_post(&self, created_at: chrono::DateTime<chrono::Utc>) {
        *self.last_post_created_at.lock().unwrap() = Some(created_at.to_rfc3339());
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn reject_issued_tokens(&self) {
        *self.accept_issued.lock().unwrap() = false;
    }

    pub fn fail_posts_with(&self, status: StatusCode) {
        *self.post_failure.lock().unwrap() = Some(status);
    }

    pub fn mark_already_liked(&self) {
        *self.already_liked.lock().unwrap() = true;
    }

    pub fn set_completion(&self, content: &str) {
        *self.completion.lock().unwrap() = content.to_string();
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn likes(&self) -> Vec<(String, String)> {
        self.likes.lock().unwrap().clone()
    }

    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.token_requests.lock().unwrap().clone()
    }

    fn accepts(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .to_string();
        self.valid_tokens
            .lock()
            .unwrap()
            .contains(&token)
            .then_some(token)
    }

    fn issue(&self, access: &str, refresh: &str) -> Response {
        if *self.accept_issued.lock().unwrap() {
            self.valid_tokens.lock().unwrap().push(access.to_string());
        }
        Json(json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": 7200,
            "refresh_token": refresh,
            "scope": "tweet.read users.read tweet.write offline.access like.write"
        }))
        .into_response()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"title": "Unauthorized", "status": 401})),
    )
        .into_response()
}

async fn users_me(State(up): State<Arc<MockUpstream>>, headers: HeaderMap) -> Response {
    match up.accepts(&headers) {
        Some(_) => Json(json!({"data": {"id": BOT_USER_ID, "name": "Hugo", "username": "hugo"}}))
            .into_response(),
        None => unauthorized(),
    }
}

async fn user_tweets(
    State(up): State<Arc<MockUpstream>>,
    Path(_user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if up.accepts(&headers).is_none() {
        return unauthorized();
    }
    let body = match up.last_post_created_at.lock().unwrap().clone() {
        Some(ts) => json!({
            "data": [{"id": "100", "text": "older post", "created_at": ts}],
            "meta": {"result_count": 1}
        }),
        None => json!({"meta": {"result_count": 0}}),
    };
    Json(body).into_response()
}

async fn create_tweet(
    State(up): State<Arc<MockUpstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(token) = up.accepts(&headers) else {
        return unauthorized();
    };
    let failure = *up.post_failure.lock().unwrap();
    if let Some(status) = failure {
        return (status, Json(json!({"title": "Service Unavailable"}))).into_response();
    }
    let text = body["text"].as_str().unwrap_or_default().to_string();
    up.posts.lock().unwrap().push((token, text.clone()));
    (
        StatusCode::CREATED,
        Json(json!({"data": {"id": NEW_POST_ID, "text": text}})),
    )
        .into_response()
}

async fn like_tweet(
    State(up): State<Arc<MockUpstream>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if up.accepts(&headers).is_none() {
        return unauthorized();
    }
    let tweet_id = body["tweet_id"].as_str().unwrap_or_default().to_string();
    up.likes.lock().unwrap().push((user_id, tweet_id));
    if *up.already_liked.lock().unwrap() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "You have already liked this Tweet."})),
        )
            .into_response();
    }
    Json(json!({"data": {"liked": true}})).into_response()
}

async fn token(
    State(up): State<Arc<MockUpstream>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    up.token_requests.lock().unwrap().push(form.clone());
    let mode = *up.refresh_mode.lock().unwrap();
    let delay = *up.refresh_delay.lock().unwrap();
    // The grant is spent as soon as the request arrives; the answer may lag.
    tokio::time::sleep(delay).await;
    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => up.issue("authorized-access", "authorized-refresh"),
        Some("refresh_token") => match mode {
            RefreshMode::Rotate => up.issue("rotated-access", "rotated-refresh"),
            RefreshMode::Revoked => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_request",
                    "error_description": "Value passed for the token was invalid."
                })),
            )
                .into_response(),
            RefreshMode::Unavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "over capacity").into_response()
            }
        },
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        )
            .into_response(),
    }
}

async fn chat_completions(State(up): State<Arc<MockUpstream>>) -> Response {
    let content = up.completion.lock().unwrap().clone();
    Json(json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

/// Serve the mock on an ephemeral port and return its base URL.
pub async fn spawn_upstream(up: Arc<MockUpstream>) -> String {
    let app = Router::new()
        .route("/users/me", get(users_me))
        .route("/users/{id}/tweets", get(user_tweets))
        .route("/users/{id}/likes", post(like_tweet))
        .route("/tweets", post(create_tweet))
        .route("/oauth2/token", post(token))
        .route("/chat/completions", post(chat_completions))
        .with_state(up);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock upstream crashed");
    });
    format!("http://{addr}")
}

pub fn temp_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "hugo-poster-{label}-{}-{}",
        std::process::id(),
        nanos
    ))
}

/// Config pointing every upstream at `base`, with tokens as given.
pub fn test_config(
    base: &str,
    env_file: PathBuf,
    access: Option<&str>,
    refresh: Option<&str>,
) -> Config {
    let base = Url::parse(base).expect("mock base url");
    let mut cfg = Config::default();
    cfg.env_file = env_file;
    cfg.twitter_client_id = Some("client-id".to_string());
    cfg.twitter_client_secret = Some("client-secret".to_string());
    cfg.twitter_redirect_uri = Some(REDIRECT_URI.to_string());
    cfg.twitter_access_token = access.map(str::to_string);
    cfg.twitter_refresh_token = refresh.map(str::to_string);
    cfg.openai_api_key = Some("sk-test".to_string());
    cfg.x_api_base_url = base.clone();
    cfg.openai_base_url = base;
    cfg.like_delay_secs = 0;
    cfg.timeout_api_test_secs = 5;
    cfg.timeout_refresh_token_secs = 5;
    cfg
}

/// Write an env file the way an operator would, returning its path.
pub fn write_env_file(label: &str, access: Option<&str>, refresh: Option<&str>) -> PathBuf {
    let path = temp_path(label).with_extension("env");
    let mut body = String::from("# bot credentials\nTWITTER_CLIENT_ID=client-id\n");
    if let Some(a) = access {
        body.push_str(&format!("TWITTER_ACCESS_TOKEN={a}\n"));
    }
    if let Some(r) = refresh {
        body.push_str(&format!("TWITTER_REFRESH_TOKEN={r}\n"));
    }
    body.push_str("OPENAI_API_KEY=sk-test\n");
    std::fs::write(&path, body).expect("failed to write env file");
    path
}

/// Parse an env file back into key/value pairs.
pub fn read_env_file(path: &std::path::Path) -> HashMap<String, String> {
    dotenvy::from_path_iter(path)
        .expect("env file unreadable")
        .map(|item| item.expect("env line unparsable"))
        .collect()
}
