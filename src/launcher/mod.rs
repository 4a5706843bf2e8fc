//! Environment guard: runs the bot only inside a prepared sandbox with its
//! declared dependencies installed, and exits with the bot's own status.

pub mod activation;
pub mod deps;

use crate::config::Config;
use crate::error::BotError;
use deps::DependencyState;
use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};

/// What a launch did, for callers that need more than the exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub installed: bool,
    pub interrupted: bool,
    pub exit_code: i32,
}

#[derive(Debug, Clone)]
pub struct Launcher {
    pub sandbox_dir: PathBuf,
    /// Activation entry point, relative to `sandbox_dir`.
    pub activation: PathBuf,
    pub manifest: PathBuf,
    /// Shell command (`sh -c`) that installs the manifest into the sandbox.
    pub install_cmd: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// How long an interrupted bot gets to exit before it is killed.
    pub stop_grace: Duration,
}

pub const STOP_GRACE: Duration = Duration::from_secs(10);

impl Launcher {
    /// Launch plan that re-executes this binary as `run` with the same env file.
    pub fn from_config(cfg: &Config) -> Result<Self, BotError> {
        let program = std::env::current_exe()?;
        Ok(Self {
            sandbox_dir: cfg.launch_sandbox_dir.clone(),
            activation: cfg.launch_activate.clone(),
            manifest: cfg.launch_manifest.clone(),
            install_cmd: cfg.launch_install_cmd.clone(),
            program,
            args: vec![
                "--env-file".into(),
                cfg.env_file.clone().into_os_string(),
                "run".into(),
            ],
            stop_grace: STOP_GRACE,
        })
    }

    pub fn activation_path(&self) -> PathBuf {
        self.sandbox_dir.join(&self.activation)
    }

    /// Fail unless the sandbox and its activation entry point both exist.
    pub fn guard(&self) -> Result<(), BotError> {
        if !self.sandbox_dir.is_dir() {
            return Err(BotError::MissingSandbox(self.sandbox_dir.clone()));
        }
        let activation = self.activation_path();
        if !activation.is_file() {
            return Err(BotError::MissingActivation(activation));
        }
        Ok(())
    }

    /// Launch and wait, treating Ctrl-C (and SIGTERM on unix) as an interrupt.
    pub async fn launch(&self) -> Result<LaunchReport, BotError> {
        self.launch_until(stop_signal()).await
    }

    /// Guard, install if needed, run the bot, and wait for it.
    ///
    /// When `interrupt` resolves first the bot gets `stop_grace` to exit on
    /// its own (a terminal Ctrl-C reaches its process group too) and is killed
    /// after that. Its status is still what gets reported.
    pub async fn launch_until<F>(&self, interrupt: F) -> Result<LaunchReport, BotError>
    where
        F: Future<Output = ()>,
    {
        self.guard()?;
        info!(sandbox = %self.sandbox_dir.display(), "Activating sandbox");
        let env = activation::activation_env(&self.sandbox_dir, &self.activation_path())?;

        let installed = match deps::check(&self.sandbox_dir, &self.manifest).await? {
            DependencyState::Satisfied => {
                info!("Dependencies up to date");
                false
            }
            DependencyState::NoManifest => false,
            DependencyState::Missing(contents) => {
                deps::install(&self.sandbox_dir, &self.install_cmd, &env, &contents).await?;
                true
            }
        };

        info!(program = %self.program.display(), "Starting bot");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .spawn()?;

        tokio::pin!(interrupt);
        let (status, interrupted) = tokio::select! {
            status = child.wait() => (status?, false),
            _ = &mut interrupt => {
                warn!(grace_secs = self.stop_grace.as_secs(), "Interrupted; waiting for the bot to stop");
                let status = match tokio::time::timeout(self.stop_grace, child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!("Bot did not stop in time; killing it");
                        child.start_kill()?;
                        child.wait().await?
                    }
                };
                (status, true)
            }
        };

        let exit_code = exit_code(status);
        if interrupted {
            info!(exit_code, "Bot stopped after interrupt");
        } else if status.success() {
            info!("Bot exited cleanly");
        } else {
            warn!(exit_code, "Bot exited with failure status");
        }
        Ok(LaunchReport {
            installed,
            interrupted,
            exit_code,
        })
    }
}

async fn stop_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = term.recv() => info!("SIGTERM received"),
                }
                return;
            }
            Err(e) => error!(error = %e, "failed to listen for SIGTERM"),
        }
    }
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Shell convention: the child's code, or 128 + signal when it was killed.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
