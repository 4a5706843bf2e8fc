use crate::config::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::BotError;
use crate::x_oauth::TokenPair;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// What to do with one token key when rewriting the env file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUpdate {
    /// Leave the existing line untouched.
    Keep,
    Set(String),
    /// Write an empty value.
    Clear,
}

impl TokenUpdate {
    fn value(&self) -> Option<&str> {
        match self {
            TokenUpdate::Keep => None,
            TokenUpdate::Set(v) => Some(v.as_str()),
            TokenUpdate::Clear => Some(""),
        }
    }
}

/// Persists the token pair into the env file. Both keys are written in a single
/// temp-file + rename, so readers never observe a half-rotated pair.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a freshly issued pair. A missing refresh token leaves the stored
    /// one in place.
    pub async fn save_pair(&self, pair: &TokenPair) -> Result<(), BotError> {
        let refresh = match pair.refresh_token.as_ref() {
            Some(rt) => TokenUpdate::Set(rt.clone()),
            None => TokenUpdate::Keep,
        };
        self.save(TokenUpdate::Set(pair.access_token.clone()), refresh)
            .await
    }

    /// Drop the refresh token after the server revoked it.
    pub async fn clear_refresh_token(&self) -> Result<(), BotError> {
        self.save(TokenUpdate::Keep, TokenUpdate::Clear).await
    }

    pub async fn save(&self, access: TokenUpdate, refresh: TokenUpdate) -> Result<(), BotError> {
        if access == TokenUpdate::Keep && refresh == TokenUpdate::Keep {
            return Ok(());
        }

        let (existing, permissions) = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => (s, Some(tokio::fs::metadata(&self.path).await?.permissions())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "env file missing; creating it");
                (String::new(), None)
            }
            Err(e) => return Err(e.into()),
        };

        let updates = [
            (ACCESS_TOKEN_KEY, access.value()),
            (REFRESH_TOKEN_KEY, refresh.value()),
        ];
        let rewritten = rewrite_env(&existing, &updates);

        let tmp = self.tmp_path();
        if let Err(e) = write_private(&tmp, rewritten.as_bytes(), permissions).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(
            path = %self.path.display(),
            access = %update_label(&access),
            refresh = %update_label(&refresh),
            "tokens saved"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".env".to_string());
        self.path.with_file_name(format!("{name}.tmp"))
    }
}

/// Write `contents` to a fresh `path`, owner-only on unix, then give it the
/// permissions of the file it replaces when there is one.
async fn write_private(
    path: &Path,
    contents: &[u8],
    permissions: Option<std::fs::Permissions>,
) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    if let Some(permissions) = permissions {
        tokio::fs::set_permissions(path, permissions).await?;
    }
    Ok(())
}

fn update_label(update: &TokenUpdate) -> &'static str {
    match update {
        TokenUpdate::Keep => "kept",
        TokenUpdate::Set(_) => "set",
        TokenUpdate::Clear => "cleared",
    }
}

/// Replace `KEY=...` lines for every key with a value, append the ones not yet
/// present, leave all other lines (comments included) as they were.
fn rewrite_env(existing: &str, updates: &[(&str, Option<&str>)]) -> String {
    let mut written = vec![false; updates.len()];
    let mut out = String::with_capacity(existing.len() + 128);

    for line in existing.lines() {
        let key = line_key(line);
        let hit = updates
            .iter()
            .enumerate()
            .find(|(_, (k, v))| v.is_some() && Some(*k) == key);
        match hit {
            Some((idx, (k, Some(v)))) => {
                if !written[idx] {
                    out.push_str(&format_line(k, v));
                    out.push('\n');
                    written[idx] = true;
                }
            }
            _ => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    for (idx, (k, v)) in updates.iter().enumerate() {
        if let (false, Some(v)) = (written[idx], v) {
            out.push_str(&format_line(k, v));
            out.push('\n');
        }
    }
    out
}

fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim())
}

fn format_line(key: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{key}=\"{escaped}\"")
}
