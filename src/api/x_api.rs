use super::ensure_success;
use crate::config::Config;
use crate::error::BotError;
use crate::types::x::{
    CreateTweetRequest, CreatedTweet, DataEnvelope, LikeRequest, LikeResult, TimelineResponse,
    XUser,
};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of probing the access token against `/users/me`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck {
    /// Token accepted, or the probe failed in a way that says nothing about the
    /// token (5xx, timeout). `user_id` is only known on a clean 200.
    Valid { user_id: Option<String> },
    /// 401 or 403: the token must be refreshed.
    Invalid,
}

impl TokenCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenCheck::Valid { .. })
    }
}

/// X API v2 endpoints the bot uses.
#[derive(Clone)]
pub struct XApi {
    http: reqwest::Client,
    cfg: Config,
}

impl XApi {
    pub fn new(http: reqwest::Client, cfg: &Config) -> Self {
        Self {
            http,
            cfg: cfg.clone(),
        }
    }

    pub async fn verify_token(&self, access_token: &str) -> TokenCheck {
        info!("Testing current access token with /users/me");
        let resp = self
            .http
            .get(self.cfg.x_api_url("users/me"))
            .bearer_auth(access_token)
            .query(&[("user.fields", "id")])
            .timeout(Duration::from_secs(self.cfg.timeout_api_test_secs))
            .send()
            .await;

        let resp = match resp {
            Ok(resp) => resp,
            Err(e) => {
                error!(error = %e, "Network error testing access token; assuming it is still valid");
                return TokenCheck::Valid { user_id: None };
            }
        };

        match resp.status() {
            StatusCode::OK => match resp.json::<DataEnvelope<XUser>>().await {
                Ok(envelope) => {
                    info!("Access token is valid");
                    TokenCheck::Valid {
                        user_id: envelope.data.map(|u| u.id),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Token accepted but user payload was unreadable");
                    TokenCheck::Valid { user_id: None }
                }
            },
            StatusCode::UNAUTHORIZED => {
                warn!("Access token is invalid or expired (401)");
                TokenCheck::Invalid
            }
            StatusCode::FORBIDDEN => {
                let body = resp.text().await.unwrap_or_default();
                warn!(body = %body, "Access token test failed (403); treating token as invalid");
                TokenCheck::Invalid
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                warn!(%status, body = %body, "Unexpected status testing token; assuming valid");
                TokenCheck::Valid { user_id: None }
            }
        }
    }

    /// Creation time of the user's most recent original post (replies and
    /// reposts excluded), `None` when the timeline is empty.
    pub async fn last_post_time(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Option<DateTime<Utc>>, BotError> {
        info!(user_id, "Fetching last post to initialize last post time");
        let url = self.cfg.x_api_url(&format!("users/{user_id}/tweets"));
        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(&[
                ("exclude", "replies,retweets"),
                ("max_results", "5"),
                ("tweet.fields", "created_at"),
            ])
            .timeout(Duration::from_secs(self.cfg.timeout_get_tweets_secs))
            .send()
            .await?;
        let timeline: TimelineResponse = ensure_success(resp).await?.json().await?;

        let count = timeline
            .meta
            .as_ref()
            .and_then(|m| m.result_count)
            .unwrap_or(0);
        let Some(latest) = timeline.data.unwrap_or_default().into_iter().next() else {
            info!(count, "No original posts found for this user");
            return Ok(None);
        };
        match latest.created_at {
            Some(ts) => Ok(Some(ts)),
            None => Err(BotError::UnexpectedResponse(format!(
                "post {} is missing created_at",
                latest.id
            ))),
        }
    }

    /// Publish a status update and return its id.
    pub async fn post(&self, access_token: &str, text: &str) -> Result<String, BotError> {
        let preview: String = text.chars().take(50).collect();
        info!(preview = %preview, "Posting status update");
        let resp = self
            .http
            .post(self.cfg.x_api_url("tweets"))
            .bearer_auth(access_token)
            .json(&CreateTweetRequest { text })
            .timeout(Duration::from_secs(self.cfg.timeout_post_tweet_secs))
            .send()
            .await?;
        let created: DataEnvelope<CreatedTweet> = ensure_success(resp).await?.json().await?;
        let Some(created) = created.data else {
            return Err(BotError::UnexpectedResponse(
                "post accepted but no id returned".to_string(),
            ));
        };
        info!(id = %created.id, url = %format!("https://x.com/i/status/{}", created.id), "Post published");
        Ok(created.id)
    }

    /// Like a post as `user_id`. A post that was already liked counts as liked.
    pub async fn like(
        &self,
        access_token: &str,
        user_id: &str,
        tweet_id: &str,
    ) -> Result<bool, BotError> {
        info!(tweet_id, user_id, "Liking post");
        let url = self.cfg.x_api_url(&format!("users/{user_id}/likes"));
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&LikeRequest { tweet_id })
            .timeout(Duration::from_secs(self.cfg.timeout_like_tweet_secs))
            .send()
            .await?;

        let resp = match ensure_success(resp).await {
            Ok(resp) => resp,
            Err(BotError::UpstreamStatus { status, body })
                if status == StatusCode::FORBIDDEN
                    && body.to_ascii_lowercase().contains("already liked") =>
            {
                warn!(tweet_id, "Post was already liked");
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        let result: DataEnvelope<LikeResult> = resp.json().await?;
        let liked = result.data.is_some_and(|d| d.liked);
        if liked {
            info!(tweet_id, "Post liked");
        } else {
            warn!(tweet_id, "Like request succeeded but response says not liked");
        }
        Ok(liked)
    }
}
