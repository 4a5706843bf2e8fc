use crate::config::Config;
use crate::error::BotError;
use crate::launcher::Launcher;

/// Run the bot through the environment guard; returns the exit code to use.
pub async fn launch(cfg: &Config) -> Result<i32, BotError> {
    let launcher = Launcher::from_config(cfg)?;
    let report = launcher.launch().await?;
    Ok(report.exit_code)
}
