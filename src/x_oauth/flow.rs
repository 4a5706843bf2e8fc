use super::endpoints::{XOauth2Client, XOauthEndpoints, build_oauth2_client, build_token_http_client};
use crate::config::Config;
use crate::error::BotError;
use crate::x_oauth::credentials::{CredentialSet, TokenPair};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use url::Url;

/// Where the one-time authorization currently stands.
pub enum FlowState {
    AwaitingAuthorizationUrl,
    AwaitingCallback {
        authorize_url: Url,
        csrf: CsrfToken,
        verifier: PkceCodeVerifier,
    },
    TokenObtained(TokenPair),
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::AwaitingAuthorizationUrl => "awaiting_authorization_url",
            FlowState::AwaitingCallback { .. } => "awaiting_callback",
            FlowState::TokenObtained(_) => "token_obtained",
        }
    }
}

/// Interactive OAuth 2.0 PKCE authorization, separate from the run loop.
///
/// `authorization_url` moves the flow to `AwaitingCallback`; `complete` takes the
/// URL the browser was redirected to and, after validating it, exchanges the
/// code for a token pair. A failed exchange sends the flow back to the start,
/// since authorization codes are single-use.
pub struct AuthorizationFlow {
    client: XOauth2Client,
    http: reqwest::Client,
    redirect_uri: String,
    insecure_transport: bool,
    state: FlowState,
}

impl AuthorizationFlow {
    pub fn new(cfg: &Config) -> Result<Self, BotError> {
        cfg.require_client_secret()?;
        let redirect_uri = cfg.require_redirect_uri()?.to_string();
        let creds = CredentialSet::from_config(cfg)?;
        Ok(Self {
            client: build_oauth2_client(cfg, &creds)?,
            http: build_token_http_client(cfg)?,
            redirect_uri,
            insecure_transport: cfg.insecure_transport(),
            state: FlowState::AwaitingAuthorizationUrl,
        })
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        match &self.state {
            FlowState::TokenObtained(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn authorization_url(&mut self) -> Result<Url, BotError> {
        if !matches!(self.state, FlowState::AwaitingAuthorizationUrl) {
            return Err(BotError::OauthFlow(format!(
                "cannot issue an authorization URL while {}",
                self.state.name()
            )));
        }
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (authorize_url, csrf) = XOauthEndpoints::build_authorize_url(&self.client, challenge);
        info!(url = %authorize_url, "Authorization URL generated");
        self.state = FlowState::AwaitingCallback {
            authorize_url: authorize_url.clone(),
            csrf,
            verifier,
        };
        Ok(authorize_url)
    }

    pub async fn complete(&mut self, callback_url: &str) -> Result<&TokenPair, BotError> {
        let expected_state = match &self.state {
            FlowState::AwaitingCallback { csrf, .. } => csrf.secret().clone(),
            other => {
                return Err(BotError::OauthFlow(format!(
                    "no authorization in progress ({})",
                    other.name()
                )));
            }
        };

        let code = parse_callback(
            callback_url,
            &self.redirect_uri,
            self.insecure_transport,
            &expected_state,
        )?;

        let FlowState::AwaitingCallback { verifier, .. } =
            std::mem::replace(&mut self.state, FlowState::AwaitingAuthorizationUrl)
        else {
            return Err(BotError::OauthFlow("authorization state lost".to_string()));
        };

        let response =
            XOauthEndpoints::exchange_authorization_code(&self.client, code, verifier, &self.http)
                .await?;
        let pair = TokenPair::from_response(&response, None)?;
        if pair.refresh_token.is_none() {
            warn!("No refresh token issued; ensure the offline.access scope was granted");
        }
        info!(
            expires_in_secs = ?pair.expires_in.map(|d| d.as_secs()),
            "Authorization completed"
        );

        self.state = FlowState::TokenObtained(pair);
        match &self.state {
            FlowState::TokenObtained(pair) => Ok(pair),
            _ => Err(BotError::OauthFlow("authorization state lost".to_string())),
        }
    }
}

/// Validate the pasted redirect URL and pull the authorization code out of it.
pub(crate) fn parse_callback(
    callback_url: &str,
    redirect_uri: &str,
    insecure_transport: bool,
    expected_state: &str,
) -> Result<AuthorizationCode, BotError> {
    let callback_url = callback_url.trim();
    if callback_url.is_empty() || !callback_url.starts_with(redirect_uri) {
        return Err(BotError::OauthFlow(format!(
            "pasted URL does not start with the redirect URI {redirect_uri}"
        )));
    }

    let url = Url::parse(callback_url)?;
    if url.scheme() != "https" && !insecure_transport {
        return Err(BotError::InsecureTransport(url.to_string()));
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            "error_description" => error_description = Some(v.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(BotError::OauthFlow(format!(
            "authorization was not granted: {error} {}",
            error_description.unwrap_or_default()
        )));
    }

    let Some(state) = state else {
        return Err(BotError::OauthFlow("missing `state` in callback".to_string()));
    };
    if !bool::from(state.as_bytes().ct_eq(expected_state.as_bytes())) {
        return Err(BotError::OauthFlow("CSRF state mismatch".to_string()));
    }

    let Some(code) = code else {
        return Err(BotError::OauthFlow("missing `code` in callback".to_string()));
    };
    Ok(AuthorizationCode::new(code))
}
