use crate::handlers::health::health_handler;
use crate::service::bot::SharedBotState;
use axum::{Router, routing::get};
use chrono::TimeDelta;

#[derive(Clone)]
pub struct BotHttpState {
    pub bot: SharedBotState,
    pub token_lifetime: TimeDelta,
}

impl BotHttpState {
    pub fn new(bot: SharedBotState, token_lifetime: TimeDelta) -> Self {
        Self {
            bot,
            token_lifetime,
        }
    }
}

pub fn bot_router(state: BotHttpState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .with_state(state)
}
