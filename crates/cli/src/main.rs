//! Capstan CLI, the main entry point.
//!
//! Commands:
//! - `chat`    Interactive chat or single-message mode
//! - `init`    Scaffold a `context/` directory and `capstan.toml`
//! - `skills`  Browse the skill library
//! - `memory`  Inspect or prune long-term memory

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "capstan",
    about = "Capstan: a skill-driven tool-calling agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ./capstan.toml or ~/.capstan/config.toml
    #[arg(short, long, global = true, env = "CAPSTAN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Create a context directory with sample skill, knowledge and persona
    Init {
        /// Application folder to initialize
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List skill categories, the skills of one category, or search skills
    Skills {
        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long, conflicts_with = "category")]
        search: Option<String>,
    },

    /// Manage long-term memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show every stored memory
    List,
    /// Delete one memory by key
    Forget { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Chat { message } => commands::chat::run(config, message).await?,
        Commands::Init { path } => commands::init::run(&path)?,
        Commands::Skills { category, search } => {
            commands::skills::run(config, category.as_deref(), search.as_deref())?
        }
        Commands::Memory { action } => match action {
            MemoryAction::List => commands::memory::list(config).await?,
            MemoryAction::Forget { key } => commands::memory::forget(config, &key).await?,
        },
    }

    Ok(())
}
