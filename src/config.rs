use crate::error::BotError;
use chrono::TimeDelta;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const ENV_FILE: &str = ".env";

pub const ACCESS_TOKEN_KEY: &str = "TWITTER_ACCESS_TOKEN";
pub const REFRESH_TOKEN_KEY: &str = "TWITTER_REFRESH_TOKEN";

/// Environment keys read into [`Config`]. Anything else in the process
/// environment is ignored.
const CONFIG_KEYS: &[&str] = &[
    "TWITTER_CLIENT_ID",
    "TWITTER_CLIENT_SECRET",
    "TWITTER_REDIRECT_URI",
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    "OPENAI_API_KEY",
    "OAUTHLIB_INSECURE_TRANSPORT",
    "X_API_BASE_URL",
    "X_AUTHORIZE_URL",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "OPENAI_MAX_COMPLETION_TOKENS",
    "SLEEP_INTERVAL_SECS",
    "POST_INTERVAL_HOURS",
    "FIRST_POST_DELAY_HOURS",
    "LIKE_DELAY_SECS",
    "TOKEN_LIFETIME_SECS",
    "TIMEOUT_API_TEST_SECS",
    "TIMEOUT_GET_TWEETS_SECS",
    "TIMEOUT_POST_TWEET_SECS",
    "TIMEOUT_LIKE_TWEET_SECS",
    "TIMEOUT_REFRESH_TOKEN_SECS",
    "TIMEOUT_OPENAI_SECS",
    "PORT",
    "LOG_LEVEL",
    "LAUNCH_SANDBOX_DIR",
    "LAUNCH_ACTIVATE",
    "LAUNCH_MANIFEST",
    "LAUNCH_INSTALL_CMD",
];

/// Keys taken verbatim from the environment. Typed parsing would turn an
/// all-digit secret into a number and drop leading zeros.
const SECRET_KEYS: &[&str] = &[
    "TWITTER_CLIENT_ID",
    "TWITTER_CLIENT_SECRET",
    "TWITTER_REDIRECT_URI",
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    "OPENAI_API_KEY",
];

/// Process-wide configuration, loaded once at startup and passed by reference.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(skip)]
    pub env_file: PathBuf,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub twitter_client_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub twitter_client_secret: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub twitter_redirect_uri: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub twitter_access_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub twitter_refresh_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub openai_api_key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub oauthlib_insecure_transport: bool,

    pub x_api_base_url: Url,
    pub x_authorize_url: Url,
    pub openai_base_url: Url,
    pub openai_model: String,
    pub openai_max_completion_tokens: u32,

    pub sleep_interval_secs: u64,
    pub post_interval_hours: u64,
    pub first_post_delay_hours: u64,
    pub like_delay_secs: u64,
    pub token_lifetime_secs: u64,

    pub timeout_api_test_secs: u64,
    pub timeout_get_tweets_secs: u64,
    pub timeout_post_tweet_secs: u64,
    pub timeout_like_tweet_secs: u64,
    pub timeout_refresh_token_secs: u64,
    pub timeout_openai_secs: u64,

    pub port: u16,
    pub log_level: String,

    pub launch_sandbox_dir: PathBuf,
    pub launch_activate: PathBuf,
    pub launch_manifest: PathBuf,
    pub launch_install_cmd: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(ENV_FILE),
            twitter_client_id: None,
            twitter_client_secret: None,
            twitter_redirect_uri: None,
            twitter_access_token: None,
            twitter_refresh_token: None,
            openai_api_key: None,
            oauthlib_insecure_transport: false,
            x_api_base_url: Url::parse("https://api.twitter.com/2").expect("valid default url"),
            x_authorize_url: Url::parse("https://twitter.com/i/oauth2/authorize")
                .expect("valid default url"),
            openai_base_url: Url::parse("https://api.openai.com/v1").expect("valid default url"),
            openai_model: "o3-mini".to_string(),
            openai_max_completion_tokens: 5000,
            sleep_interval_secs: 60 * 60,
            post_interval_hours: 24,
            first_post_delay_hours: 12,
            like_delay_secs: 2,
            token_lifetime_secs: 7200,
            timeout_api_test_secs: 10,
            timeout_get_tweets_secs: 15,
            timeout_post_tweet_secs: 30,
            timeout_like_tweet_secs: 15,
            timeout_refresh_token_secs: 20,
            timeout_openai_secs: 120,
            port: 8080,
            log_level: "info".to_string(),
            launch_sandbox_dir: PathBuf::from(".bot-env"),
            launch_activate: PathBuf::from("activate"),
            launch_manifest: PathBuf::from("Cargo.lock"),
            launch_install_cmd: "cargo build --release --locked".to_string(),
        }
    }
}

impl Config {
    /// Load the env file into the process environment (existing variables win),
    /// then extract the configuration from defaults overlaid with the environment.
    pub fn load(env_file: &Path) -> Result<Self, BotError> {
        match dotenvy::from_path(env_file) {
            Ok(()) => debug!(path = %env_file.display(), "env file loaded"),
            Err(e) if e.not_found() => debug!(path = %env_file.display(), "env file not found"),
            Err(e) => return Err(e.into()),
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(CONFIG_KEYS).ignore(SECRET_KEYS))
            .merge(raw_secrets(|key| std::env::var(key).ok()));
        let mut cfg = Self::from_figment(figment)?;
        cfg.env_file = env_file.to_path_buf();
        Ok(cfg)
    }

    /// Extract from an arbitrary figment; empty strings count as unset.
    pub fn from_figment(figment: Figment) -> Result<Self, BotError> {
        let mut cfg: Config = figment.extract()?;
        for slot in [
            &mut cfg.twitter_client_id,
            &mut cfg.twitter_client_secret,
            &mut cfg.twitter_redirect_uri,
            &mut cfg.twitter_access_token,
            &mut cfg.twitter_refresh_token,
            &mut cfg.openai_api_key,
        ] {
            if slot.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *slot = None;
            }
        }
        cfg.post_interval()?;
        cfg.first_post_delay()?;
        cfg.token_lifetime()?;
        Ok(cfg)
    }

    pub fn require_client_id(&self) -> Result<&str, BotError> {
        self.twitter_client_id
            .as_deref()
            .ok_or(BotError::MissingConfig("TWITTER_CLIENT_ID"))
    }

    pub fn require_client_secret(&self) -> Result<&str, BotError> {
        self.twitter_client_secret
            .as_deref()
            .ok_or(BotError::MissingConfig("TWITTER_CLIENT_SECRET"))
    }

    pub fn require_redirect_uri(&self) -> Result<&str, BotError> {
        self.twitter_redirect_uri
            .as_deref()
            .ok_or(BotError::MissingConfig("TWITTER_REDIRECT_URI"))
    }

    pub fn require_openai_api_key(&self) -> Result<&str, BotError> {
        self.openai_api_key
            .as_deref()
            .ok_or(BotError::MissingConfig("OPENAI_API_KEY"))
    }

    pub fn insecure_transport(&self) -> bool {
        self.oauthlib_insecure_transport
    }

    /// `{X_API_BASE_URL}/{path}` without doubling slashes.
    pub fn x_api_url(&self, path: &str) -> String {
        join_url(&self.x_api_base_url, path)
    }

    pub fn x_token_url(&self) -> String {
        self.x_api_url("oauth2/token")
    }

    pub fn openai_url(&self, path: &str) -> String {
        join_url(&self.openai_base_url, path)
    }

    pub fn sleep_interval(&self) -> Duration {
        Duration::from_secs(self.sleep_interval_secs)
    }

    pub fn post_interval(&self) -> Result<TimeDelta, BotError> {
        time_delta("POST_INTERVAL_HOURS", self.post_interval_hours, TimeDelta::try_hours)
    }

    pub fn first_post_delay(&self) -> Result<TimeDelta, BotError> {
        time_delta("FIRST_POST_DELAY_HOURS", self.first_post_delay_hours, TimeDelta::try_hours)
    }

    pub fn like_delay(&self) -> Duration {
        Duration::from_secs(self.like_delay_secs)
    }

    pub fn token_lifetime(&self) -> Result<TimeDelta, BotError> {
        time_delta("TOKEN_LIFETIME_SECS", self.token_lifetime_secs, TimeDelta::try_seconds)
    }
}

fn time_delta(
    key: &'static str,
    value: u64,
    make: fn(i64) -> Option<TimeDelta>,
) -> Result<TimeDelta, BotError> {
    i64::try_from(value)
        .ok()
        .and_then(make)
        .ok_or(BotError::InvalidConfig { key, value })
}

/// Secrets present in the environment, keyed by field name, as untouched strings.
fn raw_secrets(lookup: impl Fn(&str) -> Option<String>) -> Serialized<BTreeMap<String, String>> {
    let secrets = SECRET_KEYS
        .iter()
        .filter_map(|key| lookup(key).map(|v| (key.to_ascii_lowercase(), v)))
        .collect();
    Serialized::globals(secrets)
}

fn join_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Accept any scalar as a string, so `1234567890` stays a usable client id.
fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SecretRepr {
        Str(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<SecretRepr>::deserialize(deserializer)?.map(|repr| match repr {
        SecretRepr::Str(s) => s,
        SecretRepr::Unsigned(n) => n.to_string(),
        SecretRepr::Signed(n) => n.to_string(),
        SecretRepr::Float(n) => n.to_string(),
        SecretRepr::Bool(b) => b.to_string(),
    }))
}

/// Accept `1`, `true`, `yes`, `on` (any case) as enabled.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagRepr {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    Ok(match FlagRepr::deserialize(deserializer)? {
        FlagRepr::Bool(b) => b,
        FlagRepr::Int(i) => i != 0,
        FlagRepr::Str(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    })
}
