use crate::api::OpenAiApi;
use crate::error::BotError;
use tracing::{info, warn};

pub const MAX_POST_CHARS: usize = 280;

const FINAL_OPEN: &str = "<final_tweet>";
const FINAL_CLOSE: &str = "</final_tweet>";

pub const SYSTEM_PROMPT: &str = "You are a twitter persona that write actually useful, insightful, and slightly provocative tweets. Role Models are Paul Graham, Naval Ravikant.";

pub const DEFAULT_PROMPT: &str = "Think about a few tweets or shitposts that you would like to write. Then find the one that would perform best on twitter. Your response should include the tokens <final_tweet> before the final tweet text.";

/// Produces post drafts from the language model.
#[derive(Clone)]
pub struct PostGenerator {
    api: OpenAiApi,
}

impl PostGenerator {
    pub fn new(api: OpenAiApi) -> Self {
        Self { api }
    }

    /// Generate one sanitized draft, using `prompt_override` instead of the
    /// default prompt when given.
    pub async fn generate(&self, prompt_override: Option<&str>) -> Result<String, BotError> {
        let prompt = match prompt_override {
            Some(p) => {
                info!("Using provided prompt override");
                p
            }
            None => DEFAULT_PROMPT,
        };
        let preview: String = prompt.chars().take(100).collect();
        info!(prompt = %preview, model = %self.api.model(), "Generating post");

        let raw = self.api.complete(SYSTEM_PROMPT, prompt).await?;
        info!(raw = %raw, "Raw model response");

        let draft = sanitize_post(&raw).ok_or_else(|| {
            BotError::UnexpectedResponse("model response was empty after sanitization".to_string())
        })?;
        info!(draft = %draft, "Sanitized post");
        Ok(draft)
    }
}

/// Turn raw model output into postable text, `None` if nothing is left.
///
/// The text after the last `<final_tweet>` marker (up to `</final_tweet>`) is
/// used when the marker is present. Whitespace and wrapping quotes or
/// backticks are stripped, em dashes become hyphens, and anything over
/// [`MAX_POST_CHARS`] characters is cut with a trailing ellipsis.
pub fn sanitize_post(raw: &str) -> Option<String> {
    let body = match raw.rsplit_once(FINAL_OPEN) {
        Some((_, after)) => after.split(FINAL_CLOSE).next().unwrap_or(after),
        None => raw,
    };

    let text = body
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim_matches('`')
        .trim();
    if text.is_empty() {
        warn!("Model response was empty after sanitization");
        return None;
    }

    let text = text.replace('\u{2014}', "-");

    let len = text.chars().count();
    if len > MAX_POST_CHARS {
        warn!(len, "Model response exceeds {MAX_POST_CHARS} chars; truncating");
        let mut cut: String = text.chars().take(MAX_POST_CHARS - 3).collect();
        cut.push_str("...");
        return Some(cut);
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize_post("Hello world").as_deref(), Some("Hello world"));
        assert_eq!(
            sanitize_post("  Leading and trailing spaces  ").as_deref(),
            Some("Leading and trailing spaces")
        );
    }

    #[test]
    fn wrapping_quotes_and_backticks_are_stripped() {
        assert_eq!(sanitize_post("\"Quoted string\" ").as_deref(), Some("Quoted string"));
        assert_eq!(sanitize_post("'Single quoted'").as_deref(), Some("Single quoted"));
        assert_eq!(sanitize_post("`Backticks`").as_deref(), Some("Backticks"));
        assert_eq!(
            sanitize_post("   `Combined \"quotes\"`  ").as_deref(),
            Some("Combined \"quotes\"")
        );
    }

    #[test]
    fn blank_output_yields_nothing() {
        assert_eq!(sanitize_post(""), None);
        assert_eq!(sanitize_post("   "), None);
        assert_eq!(sanitize_post("<final_tweet>  \"\" </final_tweet>"), None);
    }

    #[test]
    fn long_output_is_truncated_by_characters() {
        let out = sanitize_post(&"A".repeat(300)).unwrap();
        assert_eq!(out, format!("{}...", "A".repeat(277)));

        let emoji = "🚀".repeat(281);
        let out = sanitize_post(&emoji).unwrap();
        assert_eq!(out.chars().count(), MAX_POST_CHARS);
        assert!(out.ends_with("..."));

        let exact = "B".repeat(280);
        assert_eq!(sanitize_post(&exact).as_deref(), Some(exact.as_str()));
    }

    #[test]
    fn final_marker_selects_the_last_candidate() {
        let raw = "Drafts:\n1. meh\n2. better\nI will mark it with <final_tweet>.\n<final_tweet>\n\"Ship small things daily.\"\n</final_tweet>\nDone.";
        assert_eq!(sanitize_post(raw).as_deref(), Some("Ship small things daily."));
    }

    #[test]
    fn em_dashes_become_hyphens() {
        assert_eq!(
            sanitize_post("<final_tweet>Build \u{2014} then sell").as_deref(),
            Some("Build - then sell")
        );
    }
}
