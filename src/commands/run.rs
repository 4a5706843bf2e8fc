use crate::api::build_http_client;
use crate::config::Config;
use crate::error::BotError;
use crate::router::{BotHttpState, bot_router};
use crate::service::bot::Bot;
use crate::service::scheduler::run_loop;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Serve `/healthz` and run the bot loop until Ctrl-C.
///
/// A halted loop leaves the health server up so the error state stays visible.
pub async fn run(cfg: &Config) -> Result<(), BotError> {
    let http = build_http_client()?;
    let mut bot = Bot::new(cfg, http)?;

    let state = BotHttpState::new(bot.shared_state(), cfg.token_lifetime()?);
    let app = bot_router(state);
    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Health server listening on {}", addr);
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "health server stopped");
        }
    });

    info!(
        sleep_secs = cfg.sleep_interval_secs,
        post_interval_hours = cfg.post_interval_hours,
        "Starting bot loop"
    );
    let fault = run_loop(&mut bot, cfg.sleep_interval(), shutdown_signal()).await;

    if let Some(fault) = fault {
        warn!(%fault, "Bot loop halted; health endpoint stays up until Ctrl-C");
        shutdown_signal().await;
    }
    server.abort();
    info!("Bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
