use crate::config::Config;
use crate::error::BotError;
use oauth2::TokenResponse;
use std::fmt;
use std::time::Duration;

/// Access and refresh token issued together. Always replaced as a unit so a
/// rotated refresh token can never be paired with a stale access token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<Duration>,
}

impl TokenPair {
    /// Build from a token endpoint response. When the server does not rotate the
    /// refresh token, `previous_refresh` is carried over.
    pub fn from_response<T: TokenResponse>(
        resp: &T,
        previous_refresh: Option<&str>,
    ) -> Result<Self, BotError> {
        let access_token = resp.access_token().secret().trim().to_string();
        if access_token.is_empty() {
            return Err(BotError::UnexpectedResponse(
                "token response did not contain an access_token".to_string(),
            ));
        }
        let refresh_token = resp
            .refresh_token()
            .map(|rt| rt.secret().to_string())
            .filter(|rt| !rt.is_empty())
            .or_else(|| previous_refresh.map(str::to_string));
        Ok(Self {
            access_token,
            refresh_token,
            expires_in: resp.expires_in(),
        })
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// OAuth and API key material required to authenticate outbound requests.
#[derive(Clone)]
pub struct CredentialSet {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub api_key: Option<String>,
}

impl CredentialSet {
    pub fn from_config(cfg: &Config) -> Result<Self, BotError> {
        Ok(Self {
            client_id: cfg.require_client_id()?.to_string(),
            client_secret: cfg.twitter_client_secret.clone(),
            redirect_uri: cfg.twitter_redirect_uri.clone(),
            access_token: cfg.twitter_access_token.clone(),
            refresh_token: cfg.twitter_refresh_token.clone(),
            api_key: cfg.openai_api_key.clone(),
        })
    }

    /// Swap in a freshly issued pair.
    pub fn apply(&mut self, pair: &TokenPair) {
        self.access_token = Some(pair.access_token.clone());
        self.refresh_token = pair.refresh_token.clone();
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = |v: &Option<String>| if v.is_some() { "Yes" } else { "No" };
        f.debug_struct("CredentialSet")
            .field("client_id", &self.client_id)
            .field("client_secret", &present(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("access_token", &present(&self.access_token))
            .field("refresh_token", &present(&self.refresh_token))
            .field("api_key", &present(&self.api_key))
            .finish()
    }
}
