use crate::router::BotHttpState;
use crate::service::bot::BotState;
use axum::{Json, extract::State};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Body of `GET /healthz`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub bot_status: String,
    pub bot_user_id: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub last_check_start_time_utc: Option<DateTime<Utc>>,
    pub last_post_time_utc: Option<DateTime<Utc>>,
    pub last_refresh_time_utc: Option<DateTime<Utc>>,
    pub access_token_status: &'static str,
    pub access_token_age_secs: Option<i64>,
    pub access_token_estimated_time_left_secs: Option<i64>,
    pub last_error: Option<String>,
}

impl HealthReport {
    /// Token expiry comes from the last refresh response when known, otherwise
    /// `token_lifetime` after the last refresh.
    pub fn from_state(state: &BotState, now: DateTime<Utc>, token_lifetime: TimeDelta) -> Self {
        let age = state.last_refresh_time.map(|t| now - t);
        let expires_at = state
            .token_expires_at
            .or_else(|| state.last_refresh_time.map(|t| t + token_lifetime));
        let time_left = expires_at.map(|e| e - now);

        let access_token_status = match time_left {
            Some(left) if left > TimeDelta::zero() => "Likely Valid",
            Some(_) => "Likely Expired",
            None => "Unknown",
        };

        Self {
            status: if state.status.is_error() { "Error" } else { "OK" },
            bot_status: state.status.to_string(),
            bot_user_id: state.bot_user_id.clone(),
            timestamp_utc: now,
            last_check_start_time_utc: state.last_check_start_time,
            last_post_time_utc: state.last_post_time,
            last_refresh_time_utc: state.last_refresh_time,
            access_token_status,
            access_token_age_secs: age.map(|a| a.num_seconds()),
            access_token_estimated_time_left_secs: time_left
                .map(|l| l.num_seconds().max(0)),
            last_error: state.last_error.clone(),
        }
    }
}

/// GET /healthz
pub async fn health_handler(State(state): State<BotHttpState>) -> Json<HealthReport> {
    let snapshot = state.bot.read().await.clone();
    Json(HealthReport::from_state(
        &snapshot,
        Utc::now(),
        state.token_lifetime,
    ))
}
