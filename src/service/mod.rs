pub mod bot;
pub mod generator;
pub mod scheduler;
pub mod token_store;

pub use bot::{Bot, BotFault, BotState, BotStatus, CycleOutcome, SharedBotState};
pub use generator::{PostGenerator, sanitize_post};
pub use token_store::{TokenStore, TokenUpdate};
