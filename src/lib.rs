pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod launcher;
pub mod router;
pub mod service;
pub mod types;
pub mod x_oauth;

pub use config::Config;
pub use error::BotError;
pub use service::bot::{Bot, BotFault, BotStatus};
pub use x_oauth::{AuthorizationFlow, CredentialSet, TokenPair, XOauthService};

pub const USER_AGENT: &str = concat!("hugo-poster/", env!("CARGO_PKG_VERSION"));
