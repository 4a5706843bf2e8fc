use crate::api::{OpenAiApi, build_http_client};
use crate::config::Config;
use crate::error::BotError;
use crate::service::generator::{DEFAULT_PROMPT, PostGenerator};
use tracing::error;

const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Generate one draft per prompt (the default prompt when none are given) and
/// print them. Nothing is posted.
pub async fn prompt_test(cfg: &Config, prompts: &[String]) -> Result<(), BotError> {
    let generator = PostGenerator::new(OpenAiApi::new(build_http_client()?, cfg)?);

    let prompts: Vec<Option<&str>> = if prompts.is_empty() {
        vec![None]
    } else {
        prompts.iter().map(|p| Some(p.as_str())).collect()
    };

    for (i, prompt) in prompts.iter().enumerate() {
        println!("--- Prompt {} ---", i + 1);
        println!("{}", prompt.unwrap_or(DEFAULT_PROMPT));
        match generator.generate(*prompt).await {
            Ok(draft) => {
                println!("{GREEN}{draft}{RESET}");
                println!("({} chars)", draft.chars().count());
            }
            Err(e) => {
                error!(error = %e, "Generation failed");
                println!("Generation failed: {e}");
            }
        }
        println!();
    }
    Ok(())
}
