use crate::error::BotError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// Copy of the manifest as of the last successful install.
pub const STAMP_FILE: &str = ".manifest.stamp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyState {
    /// The sandbox was installed from exactly this manifest.
    Satisfied,
    /// Manifest changed (or never installed); carries the manifest contents.
    Missing(Vec<u8>),
    /// Nothing declared.
    NoManifest,
}

pub(crate) fn stamp_path(sandbox: &Path) -> PathBuf {
    sandbox.join(STAMP_FILE)
}

pub(crate) async fn check(sandbox: &Path, manifest: &Path) -> Result<DependencyState, BotError> {
    let declared = match tokio::fs::read(manifest).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(manifest = %manifest.display(), "dependency manifest not found; nothing to install");
            return Ok(DependencyState::NoManifest);
        }
        Err(e) => return Err(e.into()),
    };

    match tokio::fs::read(stamp_path(sandbox)).await {
        Ok(stamp) if stamp == declared => Ok(DependencyState::Satisfied),
        Ok(_) => Ok(DependencyState::Missing(declared)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DependencyState::Missing(declared)),
        Err(e) => Err(e.into()),
    }
}

/// Run the install command inside the activated environment, then stamp the
/// sandbox with the manifest it was installed from.
pub(crate) async fn install(
    sandbox: &Path,
    install_cmd: &str,
    env: &[(OsString, OsString)],
    manifest_contents: &[u8],
) -> Result<(), BotError> {
    info!(command = %install_cmd, "Installing declared dependencies");
    let status = Command::new("sh")
        .arg("-c")
        .arg(install_cmd)
        .envs(env.iter().map(|(k, v)| (k, v)))
        .status()
        .await?;
    if !status.success() {
        return Err(BotError::InstallFailed {
            command: install_cmd.to_string(),
            status: status.to_string(),
        });
    }
    tokio::fs::write(stamp_path(sandbox), manifest_contents).await?;
    info!("Dependencies installed");
    Ok(())
}
