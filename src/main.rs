use clap::{Parser, Subcommand};
use hugo_poster::config::{Config, ENV_FILE};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "hugo-poster", version, about = "Posts a generated update to X on a fixed cadence")]
struct Cli {
    /// Env file holding credentials; tokens are written back here.
    #[arg(long, global = true, env = "ENV_FILE", default_value = ENV_FILE)]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bot loop and the /healthz endpoint.
    Run,
    /// One-time interactive OAuth 2.0 authorization.
    Authorize,
    /// Run the bot inside the prepared sandbox, installing dependencies first.
    Launch,
    /// Generate drafts without posting.
    PromptTest {
        /// Prompt to try; repeat for several. Uses the built-in prompt when absent.
        #[arg(long = "prompt")]
        prompts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let env_file_present = cli.env_file.is_file();
    let cfg = Config::load(&cli.env_file)?;

    let default_level = match cli.command {
        Command::PromptTest { .. } => "debug".to_string(),
        _ => cfg.log_level.clone(),
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    if !env_file_present {
        warn!(path = %cli.env_file.display(), "env file not found; using process environment only");
    }
    info!(
        env_file = %cfg.env_file.display(),
        x_api = %cfg.x_api_base_url,
        model = %cfg.openai_model,
        port = cfg.port
    );

    match cli.command {
        Command::Run => hugo_poster::commands::run(&cfg).await?,
        Command::Authorize => hugo_poster::commands::authorize(&cfg).await?,
        Command::PromptTest { prompts } => {
            hugo_poster::commands::prompt_test(&cfg, &prompts).await?
        }
        Command::Launch => match hugo_poster::commands::launch(&cfg).await {
            Ok(code) => std::process::exit(code),
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
