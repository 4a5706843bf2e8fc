use crate::error::BotError;
use std::ffi::OsString;
use std::path::Path;
use tracing::debug;

/// Variable exported to the bot so it can tell it runs inside the sandbox.
pub const SANDBOX_ENV: &str = "HUGO_POSTER_SANDBOX";

/// Environment the activation entry point establishes for the child: every
/// `KEY=VALUE` (dotenv syntax, `export` allowed) from the entry point, the
/// sandbox marker, and `<sandbox>/bin` at the front of `PATH`.
pub(crate) fn activation_env(
    sandbox: &Path,
    activation: &Path,
) -> Result<Vec<(OsString, OsString)>, BotError> {
    let mut env: Vec<(OsString, OsString)> = Vec::new();
    for item in dotenvy::from_path_iter(activation)? {
        let (key, value) = item?;
        debug!(key = %key, "activation variable");
        env.push((key.into(), value.into()));
    }

    let sandbox_abs = std::path::absolute(sandbox)?;
    let mut path_entries = vec![sandbox_abs.join("bin")];
    if let Some(existing) = std::env::var_os("PATH") {
        path_entries.extend(std::env::split_paths(&existing));
    }
    let joined = std::env::join_paths(path_entries)
        .map_err(|e| BotError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    env.push((SANDBOX_ENV.into(), sandbox_abs.into_os_string()));
    env.push(("PATH".into(), joined));
    Ok(env)
}
