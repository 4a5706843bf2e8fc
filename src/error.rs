use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BotError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("env file error: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("{key} = {value} is out of range")]
    InvalidConfig { key: &'static str, value: u64 },

    #[error("{0} is not set; add it to the env file")]
    MissingConfig(&'static str),

    #[error("Missing access token; run `hugo-poster authorize` first")]
    MissingAccessToken,

    #[error("Missing refresh token; run `hugo-poster authorize` to re-authorize")]
    MissingRefreshToken,

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("refusing non-TLS OAuth callback {0}; set OAUTHLIB_INSECURE_TRANSPORT=1 for local development")]
    InsecureTransport(String),

    #[error("Upstream error with status {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("Unexpected upstream response: {0}")]
    UnexpectedResponse(String),

    #[error("sandbox directory {} not found; create it before launching", .0.display())]
    MissingSandbox(PathBuf),

    #[error("activation entry point {} not found inside the sandbox", .0.display())]
    MissingActivation(PathBuf),

    #[error("dependency installation `{command}` failed with {status}")]
    InstallFailed { command: String, status: String },
}

impl BotError {
    /// True when the authorization server rejected the grant itself, meaning the
    /// refresh token will never work again.
    pub fn is_revoked_grant(&self) -> bool {
        match self {
            BotError::Oauth2Server { error } => {
                error == "invalid_grant" || error == "invalid_request"
            }
            _ => false,
        }
    }
}

impl From<figment::Error> for BotError {
    fn from(e: figment::Error) -> Self {
        BotError::Config(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for BotError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => BotError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                BotError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => BotError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => BotError::Oauth2Token(s),
        }
    }
}
