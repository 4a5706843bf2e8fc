use crate::config::Config;
use crate::error::BotError;
use crate::x_oauth::X_SCOPES;
use crate::x_oauth::credentials::CredentialSet;

use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, StandardRevocableToken, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Stateless X OAuth endpoints.
pub(crate) struct XOauthEndpoints;

impl XOauthEndpoints {
    /// Consent page URL with a PKCE challenge and the bot's scopes.
    pub(crate) fn build_authorize_url(
        client: &XOauth2Client,
        challenge: PkceCodeChallenge,
    ) -> (Url, CsrfToken) {
        client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(X_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(challenge)
            .url()
    }

    pub(crate) async fn exchange_authorization_code(
        client: &XOauth2Client,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, BotError> {
        let token = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(http_client)
            .await?;
        info!("Authorization code exchanged for tokens");
        Ok(token)
    }

    /// Refresh the access token using the current refresh token.
    pub(crate) async fn refresh_access_token(
        client: &XOauth2Client,
        refresh_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, BotError> {
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(http_client)
            .await?;
        info!("Access token refreshed successfully");
        Ok(token)
    }
}

/// Build the X OAuth2 client from credentials. The client secret, when present,
/// is sent as HTTP Basic auth on token requests.
pub(crate) fn build_oauth2_client(
    cfg: &Config,
    creds: &CredentialSet,
) -> Result<XOauth2Client, BotError> {
    let mut client = OAuth2Client::new(ClientId::new(creds.client_id.clone()))
        .set_auth_uri(AuthUrl::new(cfg.x_authorize_url.as_str().to_string())?)
        .set_token_uri(TokenUrl::new(cfg.x_token_url())?);
    if let Some(secret) = creds.client_secret.as_ref() {
        client = client.set_client_secret(ClientSecret::new(secret.clone()));
    }
    if let Some(redirect) = creds.redirect_uri.as_ref() {
        client = client.set_redirect_uri(RedirectUrl::new(redirect.clone())?);
    }
    Ok(client)
}

/// HTTP client used for token requests. Redirects are disabled as the token
/// endpoint must answer directly.
pub(crate) fn build_token_http_client(cfg: &Config) -> Result<reqwest::Client, BotError> {
    let client = reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(cfg.timeout_refresh_token_secs))
        .build()?;
    Ok(client)
}

pub(crate) type XOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> CredentialSet {
        CredentialSet {
            client_id: "client-123".into(),
            client_secret: Some("shh".into()),
            redirect_uri: Some("http://localhost:3000/callback".into()),
            access_token: None,
            refresh_token: None,
            api_key: None,
        }
    }

    #[test]
    fn authorize_url_carries_pkce_scopes_and_state() {
        let cfg = Config::default();
        let client = build_oauth2_client(&cfg, &creds()).expect("client");
        let (challenge, _verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf) = XOauthEndpoints::build_authorize_url(&client, challenge);

        assert!(url.as_str().starts_with("https://twitter.com/i/oauth2/authorize"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("client_id").as_deref(), Some("client-123"));
        assert_eq!(get("response_type").as_deref(), Some("code"));
        assert_eq!(get("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(get("state").as_deref(), Some(csrf.secret().as_str()));
        assert_eq!(
            get("redirect_uri").as_deref(),
            Some("http://localhost:3000/callback")
        );
        let scope = get("scope").expect("scope param");
        for s in X_SCOPES {
            assert!(scope.split(' ').any(|x| x == *s), "missing scope {s}");
        }
    }
}
