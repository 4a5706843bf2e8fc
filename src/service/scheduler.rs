use crate::service::bot::{Bot, BotFault, CycleOutcome};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Run check cycles until the bot halts or `shutdown` resolves.
///
/// Returns the fault that stopped the loop, `None` on shutdown.
pub async fn run_loop<F>(bot: &mut Bot, interval: Duration, shutdown: F) -> Option<BotFault>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let state = bot.shared_state();

    loop {
        // A cycle may be mid-way through a token rotation; it always runs to
        // completion so the new pair reaches the env file.
        let cycle = bot.run_cycle();
        tokio::pin!(cycle);
        let outcome = tokio::select! {
            outcome = &mut cycle => outcome,
            _ = &mut shutdown => {
                info!("Shutdown requested; finishing the current check cycle");
                let outcome = cycle.await;
                info!(?outcome, "Check cycle finished; stopping bot loop");
                return None;
            }
        };

        if let CycleOutcome::Halt(fault) = outcome {
            error!(%fault, "Halting bot loop due to critical error state");
            return Some(fault);
        }

        let status = state.read().await.status.to_string();
        info!(
            sleep_secs = interval.as_secs(),
            status = %status,
            "Sleeping until next check cycle"
        );
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                info!("Shutdown requested; stopping bot loop");
                return None;
            }
        }
    }
}
