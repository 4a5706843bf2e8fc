use crate::api::{OpenAiApi, TokenCheck, XApi};
use crate::config::Config;
use crate::error::BotError;
use crate::service::generator::PostGenerator;
use crate::service::token_store::TokenStore;
use crate::x_oauth::{CredentialSet, RefreshOutcome, XOauthService};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Conditions that need an operator; the loop stops on any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotFault {
    MissingAccessToken,
    InvalidTokens,
    RefreshedTokenInvalid,
    RefreshTokenRevoked,
}

impl fmt::Display for BotFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BotFault::MissingAccessToken => {
                "Missing access token; run `hugo-poster authorize`"
            }
            BotFault::InvalidTokens => {
                "Access token invalid and no refresh token available; run `hugo-poster authorize`"
            }
            BotFault::RefreshedTokenInvalid => "Newly refreshed access token failed validation",
            BotFault::RefreshTokenRevoked => {
                "Refresh token is invalid or revoked; run `hugo-poster authorize`"
            }
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotStatus {
    Initialized,
    RunningCheckCycle,
    GeneratingPost,
    Posting,
    Liking,
    Idle,
    /// Transient refresh failure; the next cycle tries again.
    RefreshFailed,
    Halted(BotFault),
}

impl BotStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, BotStatus::RefreshFailed | BotStatus::Halted(_))
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotStatus::Initialized => f.write_str("Initialized"),
            BotStatus::RunningCheckCycle => f.write_str("Running Check Cycle"),
            BotStatus::GeneratingPost => f.write_str("Generating Post"),
            BotStatus::Posting => f.write_str("Posting"),
            BotStatus::Liking => f.write_str("Liking Post"),
            BotStatus::Idle => f.write_str("Idle"),
            BotStatus::RefreshFailed => f.write_str("Error: Token Refresh Failed (Will Retry)"),
            BotStatus::Halted(fault) => write!(f, "Error: {fault}"),
        }
    }
}

/// Observable bot state, shared with the health endpoint. Holds no secrets.
#[derive(Debug, Clone)]
pub struct BotState {
    pub status: BotStatus,
    pub bot_user_id: Option<String>,
    pub last_post_time: Option<DateTime<Utc>>,
    pub last_check_start_time: Option<DateTime<Utc>>,
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl BotState {
    pub fn new() -> Self {
        Self {
            status: BotStatus::Initialized,
            bot_user_id: None,
            last_post_time: None,
            last_check_start_time: None,
            last_refresh_time: None,
            token_expires_at: None,
            last_error: None,
        }
    }
}

impl Default for BotState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedBotState = Arc<RwLock<BotState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    Halt(BotFault),
}

/// Posting cadence knobs taken from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub post_interval: TimeDelta,
    pub first_post_delay: TimeDelta,
    pub like_delay: Duration,
}

impl Cadence {
    pub fn from_config(cfg: &Config) -> Result<Self, BotError> {
        Ok(Self {
            post_interval: cfg.post_interval()?,
            first_post_delay: cfg.first_post_delay()?,
            like_delay: cfg.like_delay(),
        })
    }
}

/// The posting bot: checks the token, refreshes it when needed, and publishes a
/// generated post once the posting interval has elapsed.
pub struct Bot {
    creds: CredentialSet,
    oauth: XOauthService,
    x: XApi,
    generator: PostGenerator,
    cadence: Cadence,
    state: SharedBotState,
}

impl Bot {
    pub fn new(cfg: &Config, http: reqwest::Client) -> Result<Self, BotError> {
        let creds = CredentialSet::from_config(cfg)?;
        let oauth = XOauthService::new(cfg, &creds, TokenStore::new(&cfg.env_file))?;
        let x = XApi::new(http.clone(), cfg);
        let generator = PostGenerator::new(OpenAiApi::new(http, cfg)?);
        info!(credentials = ?creds, "Bot state initialized");
        Ok(Self::from_parts(creds, oauth, x, generator, Cadence::from_config(cfg)?))
    }

    pub fn from_parts(
        creds: CredentialSet,
        oauth: XOauthService,
        x: XApi,
        generator: PostGenerator,
        cadence: Cadence,
    ) -> Self {
        let mut state = BotState::new();
        if creds.access_token.is_some() {
            state.last_refresh_time = Some(Utc::now());
        }
        Self {
            creds,
            oauth,
            x,
            generator,
            cadence,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn shared_state(&self) -> SharedBotState {
        self.state.clone()
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.creds
    }

    /// One check cycle. Returns `Halt` when only a new authorization can help.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if let BotStatus::Halted(fault) = self.state.read().await.status {
            warn!(%fault, "Bot is halted; skipping cycle");
            return CycleOutcome::Halt(fault);
        }

        let now = Utc::now();
        self.update(|s| {
            s.last_check_start_time = Some(now);
            s.last_error = None;
            s.status = BotStatus::RunningCheckCycle;
        })
        .await;
        debug!("Starting check cycle");

        let Some(access_token) = self.creds.access_token.clone() else {
            return self.halt(BotFault::MissingAccessToken).await;
        };

        let check = self.x.verify_token(&access_token).await;
        self.note_user(&check).await;

        if !check.is_valid() {
            if self.creds.refresh_token.is_none() {
                return self.halt(BotFault::InvalidTokens).await;
            }
            match self.oauth.refresh(&mut self.creds).await {
                RefreshOutcome::Refreshed(pair) => {
                    let refreshed_at = Utc::now();
                    let expires_at = pair
                        .expires_in
                        .and_then(|d| TimeDelta::from_std(d).ok())
                        .map(|d| refreshed_at + d);
                    self.update(|s| {
                        s.last_refresh_time = Some(refreshed_at);
                        s.token_expires_at = expires_at;
                    })
                    .await;
                    info!("Token refresh successful");

                    let recheck = self.x.verify_token(&pair.access_token).await;
                    self.note_user(&recheck).await;
                    if !recheck.is_valid() {
                        return self.halt(BotFault::RefreshedTokenInvalid).await;
                    }
                }
                RefreshOutcome::Revoked(e) => {
                    error!(error = %e, "Token refresh rejected");
                    return self.halt(BotFault::RefreshTokenRevoked).await;
                }
                RefreshOutcome::Transient(e) => {
                    error!(error = %e, "Token refresh failed; will retry next cycle");
                    self.update(|s| {
                        s.status = BotStatus::RefreshFailed;
                        s.last_error = Some(format!("token refresh failed (will retry): {e}"));
                    })
                    .await;
                    return CycleOutcome::Continue;
                }
            }
        }

        if self.ready_to_post(now).await {
            self.publish().await;
        }

        self.update(|s| s.status = BotStatus::Idle).await;
        debug!("Check cycle end");
        CycleOutcome::Continue
    }

    async fn ready_to_post(&self, now: DateTime<Utc>) -> bool {
        let (mut last_post, user_id) = {
            let s = self.state.read().await;
            (s.last_post_time, s.bot_user_id.clone())
        };

        if last_post.is_none()
            && let Some(user_id) = user_id.as_deref()
        {
            last_post = Some(self.initial_last_post_time(user_id, now).await);
            self.update(|s| s.last_post_time = last_post).await;
        }

        match last_post {
            None => {
                warn!("Cannot determine last post time yet (bot user id unknown); not ready");
                false
            }
            Some(last) => {
                let since = now - last;
                if since >= self.cadence.post_interval {
                    info!(since_secs = since.num_seconds(), "Posting interval elapsed; ready to post");
                    true
                } else {
                    debug!(since_secs = since.num_seconds(), "Waiting for posting interval");
                    false
                }
            }
        }
    }

    /// Last post time from the timeline, or a fallback that delays the first
    /// post by `first_post_delay` when the history is unknown.
    async fn initial_last_post_time(&self, user_id: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        let access_token = self.creds.access_token.as_deref().unwrap_or_default();
        match self.x.last_post_time(user_id, access_token).await {
            Ok(Some(ts)) => {
                info!(last_post = %ts, "Initialized last post time from timeline");
                ts
            }
            Ok(None) => self.fallback_last_post_time(now),
            Err(e) => {
                warn!(error = %e, "Failed to fetch last post time");
                self.fallback_last_post_time(now)
            }
        }
    }

    fn fallback_last_post_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let fallback = now - self.cadence.post_interval + self.cadence.first_post_delay;
        info!(
            last_post = %fallback,
            first_post_delay_hours = self.cadence.first_post_delay.num_hours(),
            "Using fallback last post time"
        );
        fallback
    }

    async fn publish(&self) {
        info!("Attempting to generate and post a new update");
        self.update(|s| s.status = BotStatus::GeneratingPost).await;
        let draft = match self.generator.generate(None).await {
            Ok(draft) => draft,
            Err(e) => {
                error!(error = %e, "Failed to generate a valid post this cycle");
                self.update(|s| s.last_error = Some(format!("failed to generate post: {e}")))
                    .await;
                return;
            }
        };

        self.update(|s| s.status = BotStatus::Posting).await;
        let access_token = self.creds.access_token.as_deref().unwrap_or_default();
        let post_id = match self.x.post(access_token, &draft).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to post the generated update");
                self.update(|s| s.last_error = Some(format!("failed to post: {e}")))
                    .await;
                return;
            }
        };

        let posted_at = Utc::now();
        let user_id = {
            let mut s = self.state.write().await;
            s.last_post_time = Some(posted_at);
            s.bot_user_id.clone()
        };
        info!(last_post = %posted_at, "Updated last post time");

        let Some(user_id) = user_id else {
            warn!("Post published, but cannot like it without the bot user id");
            return;
        };
        self.update(|s| s.status = BotStatus::Liking).await;
        tokio::time::sleep(self.cadence.like_delay).await;
        if let Err(e) = self.x.like(access_token, &user_id, &post_id).await {
            warn!(error = %e, post_id = %post_id, "Failed to like the new post");
        }
    }

    async fn note_user(&self, check: &TokenCheck) {
        let mut s = self.state.write().await;
        match check {
            TokenCheck::Valid {
                user_id: Some(user_id),
            } => {
                if s.bot_user_id.as_deref() != Some(user_id.as_str()) {
                    info!(user_id = %user_id, "Bot user id confirmed");
                    s.bot_user_id = Some(user_id.clone());
                }
            }
            TokenCheck::Valid { user_id: None } if s.bot_user_id.is_none() => {
                warn!("Could not confirm bot user id this cycle");
            }
            _ => {}
        }
    }

    async fn halt(&self, fault: BotFault) -> CycleOutcome {
        error!(%fault, "Halting bot loop");
        self.update(|s| {
            s.status = BotStatus::Halted(fault);
            s.last_error = Some(fault.to_string());
        })
        .await;
        CycleOutcome::Halt(fault)
    }

    async fn update(&self, f: impl FnOnce(&mut BotState)) {
        let mut s = self.state.write().await;
        f(&mut s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses_are_flagged() {
        assert!(BotStatus::RefreshFailed.is_error());
        assert!(BotStatus::Halted(BotFault::InvalidTokens).is_error());
        assert!(!BotStatus::Idle.is_error());
        assert_eq!(
            BotStatus::Halted(BotFault::RefreshTokenRevoked).to_string(),
            "Error: Refresh token is invalid or revoked; run `hugo-poster authorize`"
        );
    }
}
