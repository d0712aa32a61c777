use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use chatline::agent::ChatController;
use chatline::commands::{self, AskOutcome};
use chatline::config::{self, Config};
use chatline::error::ChatError;
use chatline::llm::LlmClient;
use chatline::ui;

#[derive(Parser)]
#[command(name = "chatline")]
#[command(version)]
#[command(about = "Chat with hosted LLMs from your terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model to start with
    #[arg(long, global = true)]
    model: Option<String>,

    /// System prompt override
    #[arg(long, global = true)]
    system: Option<String>,

    /// Colour theme for the chat screen
    #[arg(long, value_enum)]
    theme: Option<ThemeArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Dark,
    Light,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and stream the answer to stdout
    Ask {
        /// The prompt; multiple words are joined with spaces
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Attach a png or jpeg image
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List available models
    Models,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            if err.downcast_ref::<ChatError>().is_some_and(ChatError::is_fatal) {
                eprintln!("💡 Run `chatline init` or put the key in a .env file.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    config::load_dotenv();

    match cli.command {
        None => {
            init_file_logging()?;
            let mut config = Config::load()?;
            apply_overrides(&mut config, cli.model, cli.system);
            if let Some(theme) = cli.theme {
                config.ui.theme = match theme {
                    ThemeArg::Dark => "dark",
                    ThemeArg::Light => "light",
                }
                .to_string();
            }

            let client = LlmClient::new(&config)?;
            tracing::info!("Starting chat with {}", config.default_model);
            ui::run(ChatController::from_config(client, &config)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Ask { prompt, image }) => {
            init_stderr_logging();
            let mut config = Config::load()?;
            apply_overrides(&mut config, cli.model, cli.system);

            let client = LlmClient::new(&config)?;
            let mut controller = ChatController::from_config(client, &config);
            let outcome = commands::ask(
                &mut controller,
                &prompt.join(" "),
                image.as_deref(),
                &mut std::io::stdout(),
                &mut std::io::stderr(),
            )
            .await?;

            Ok(match outcome {
                AskOutcome::Answered { .. } => ExitCode::SUCCESS,
                AskOutcome::Failed => ExitCode::FAILURE,
            })
        }
        Some(Commands::Models) => {
            init_stderr_logging();
            let mut config = Config::load()?;
            apply_overrides(&mut config, cli.model, None);
            commands::list_models(&config, &mut std::io::stdout())?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Init { force }) => {
            init_stderr_logging();
            let path = commands::init_config(&Config::default_path()?, force)?;
            println!("✅ Wrote default config to {}", path.display());
            println!(
                "💡 Set {} in your environment or add `api_key` to the file.",
                Config::default().provider.api_key_env
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn apply_overrides(config: &mut Config, model: Option<String>, system: Option<String>) {
    if let Some(model) = model {
        config.default_model = model;
    }
    if let Some(system) = system {
        config.system_prompt = system;
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// One-shot commands log to stderr so stdout stays clean
fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The chat screen owns the terminal, so logs go to a file
fn init_file_logging() -> Result<()> {
    let dir = Config::home_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("chatline.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
