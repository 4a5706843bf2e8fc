use crate::config::{ACCESS_TOKEN_KEY, Config, REFRESH_TOKEN_KEY};
use crate::error::BotError;
use crate::service::token_store::TokenStore;
use crate::x_oauth::AuthorizationFlow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

/// Interactive one-time authorization: print the consent URL, read back the
/// redirect URL, exchange it, and persist both tokens to the env file.
pub async fn authorize(cfg: &Config) -> Result<(), BotError> {
    let mut flow = AuthorizationFlow::new(cfg)?;
    let url = flow.authorization_url()?;

    println!("1. Open this URL in a browser and approve access:\n\n   {url}\n");
    println!(
        "2. You will be redirected to {}. Copy the full URL from the address bar.",
        flow.redirect_uri()
    );
    println!("3. Paste it here and press Enter:");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let callback = loop {
        match stdin.next_line().await? {
            Some(line) if !line.trim().is_empty() => break line.trim().to_string(),
            Some(_) => continue,
            None => {
                return Err(BotError::OauthFlow(
                    "input closed before a redirect URL was entered".to_string(),
                ));
            }
        }
    };

    let pair = flow.complete(&callback).await?;
    let store = TokenStore::new(&cfg.env_file);
    match store.save_pair(pair).await {
        Ok(()) => {
            println!("Tokens saved to {}.", store.path().display());
            println!("Run `hugo-poster launch` to start the bot.");
        }
        Err(e) => {
            error!(error = %e, "Failed to save tokens");
            println!("Could not update {}. Add these lines manually:", store.path().display());
            println!("{ACCESS_TOKEN_KEY}={}", pair.access_token);
            if let Some(refresh) = &pair.refresh_token {
                println!("{REFRESH_TOKEN_KEY}={refresh}");
            }
        }
    }
    Ok(())
}
