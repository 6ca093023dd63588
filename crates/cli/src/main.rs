//! fewshot CLI, the main entry point.
//!
//! Commands:
//! - `infer`    Run few-shot inference over an input file
//! - `preview`  Print assembled prompts without calling a model
//! - `config`   Print the default configuration or validate a file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::PromptArgs;

#[derive(Parser)]
#[command(
    name = "fewshot",
    about = "Few-shot prompted inference for text simplification",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Simplify every input and write predictions as JSON lines
    Infer {
        #[command(flatten)]
        prompt: PromptArgs,

        /// Model name: openai-<model>, cohere-<model>, a local preset or a GGUF path
        #[arg(short, long)]
        model: Option<String>,

        /// Predictions file (stdout when neither this nor output_dir is set)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Inputs per model call
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Print the assembled prompts for the first inputs
    Preview {
        #[command(flatten)]
        prompt: PromptArgs,

        /// Number of prompts to print
        #[arg(short = 'n', long, default_value_t = 3)]
        limit: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML
    Show,
    /// Load and validate a configuration file
    Validate {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Infer {
            prompt,
            model,
            output,
            batch_size,
        } => commands::infer::run(prompt, model, output, batch_size).await?,
        Commands::Preview { prompt, limit } => commands::preview::run(prompt, limit).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate { config } => {
                commands::config_cmd::validate(config.as_deref()).await?
            }
        },
    }

    Ok(())
}
