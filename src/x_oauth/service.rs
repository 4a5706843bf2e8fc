use super::endpoints::{XOauth2Client, XOauthEndpoints, build_oauth2_client, build_token_http_client};
use crate::config::Config;
use crate::error::BotError;
use crate::service::token_store::TokenStore;
use crate::x_oauth::credentials::{CredentialSet, TokenPair};
use tracing::{error, info, warn};

/// Result of one refresh attempt.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// New pair issued, applied to the credential set and persisted.
    Refreshed(TokenPair),
    /// The grant is gone; only a new interactive authorization can recover.
    Revoked(BotError),
    /// Network or server trouble; the previous refresh token is still usable.
    Transient(BotError),
}

/// Service layer composing X OAuth token refresh with env-file persistence.
pub struct XOauthService {
    client: XOauth2Client,
    http: reqwest::Client,
    store: TokenStore,
}

impl XOauthService {
    pub fn new(cfg: &Config, creds: &CredentialSet, store: TokenStore) -> Result<Self, BotError> {
        Ok(Self {
            client: build_oauth2_client(cfg, creds)?,
            http: build_token_http_client(cfg)?,
            store,
        })
    }

    /// Exchange the current refresh token for a new pair. On success both tokens
    /// are swapped in `creds` and written back together; on revocation the stored
    /// refresh token is cleared.
    pub async fn refresh(&self, creds: &mut CredentialSet) -> RefreshOutcome {
        warn!("Attempting to refresh access token");
        let Some(refresh_token) = creds.refresh_token.clone() else {
            error!("Cannot refresh: no refresh token available");
            return RefreshOutcome::Revoked(BotError::MissingRefreshToken);
        };

        let response =
            match XOauthEndpoints::refresh_access_token(&self.client, &refresh_token, &self.http)
                .await
            {
                Ok(resp) => resp,
                Err(e) if e.is_revoked_grant() => {
                    error!(error = %e, "Refresh token is invalid or revoked");
                    creds.refresh_token = None;
                    if let Err(save_err) = self.store.clear_refresh_token().await {
                        error!(error = %save_err, "Failed to clear revoked refresh token");
                    }
                    return RefreshOutcome::Revoked(e);
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed; keeping current refresh token");
                    return RefreshOutcome::Transient(e);
                }
            };

        let pair = match TokenPair::from_response(&response, Some(&refresh_token)) {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Refresh response was unusable");
                return RefreshOutcome::Transient(e);
            }
        };

        info!(
            expires_in_secs = ?pair.expires_in.map(|d| d.as_secs()),
            rotated = pair.refresh_token.as_deref() != Some(refresh_token.as_str()),
            "Access token refreshed"
        );

        creds.apply(&pair);
        if let Err(e) = self.store.save_pair(&pair).await {
            error!(
                path = %self.store.path().display(),
                error = %e,
                "Saving refreshed tokens failed; continuing with unsaved tokens"
            );
        }
        RefreshOutcome::Refreshed(pair)
    }
}
