//! X (Twitter) OAuth 2.0 with PKCE: authorization, token refresh and the
//! credential material both operate on.

pub mod credentials;
pub mod endpoints;
pub mod flow;
pub mod service;

pub use credentials::{CredentialSet, TokenPair};
pub use flow::AuthorizationFlow;
pub use service::{RefreshOutcome, XOauthService};

/// Scopes the bot needs: read its own profile, post, like, and keep a refresh token.
pub const X_SCOPES: &[&str] = &[
    "tweet.read",
    "users.read",
    "tweet.write",
    "offline.access",
    "like.write",
];
