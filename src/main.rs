mod commands;
mod config;
mod events;
mod listings;
mod llm;
mod markup;
mod session;
mod transcript;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use llm::LlmClient;
use session::ChatSession;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rental-chat")]
#[command(version)]
#[command(about = "Chat assistant for a vacation-rental catalog", long_about = None)]
struct Cli {
    /// Config file (default: ~/.rental-chat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rentals JSON path or URL, overrides the config
    #[arg(long, global = true)]
    listings: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat panel (default)
    Chat,
    /// Ask a single question and print the reply
    Ask {
        message: Vec<String>,
        /// Print the reply as HTML
        #[arg(long)]
        html: bool,
    },
    /// Print the system prompt built from the listings
    Prompt,
    /// Print the loaded listings
    Listings,
}

/// Route logs to stderr, or to `log_file` while the terminal UI owns the screen
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = match (verbose, log_file.is_some()) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let env = env_logger::Env::default().default_filter_or(format!("rental_chat={}", level));
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(listings) = cli.listings {
        config.listings = listings;
    }

    let log_file = match command {
        Commands::Chat => {
            config.ensure_home()?;
            Some(config.log_path())
        }
        _ => None,
    };
    init_logging(cli.verbose, log_file.as_deref())?;

    if !config.has_api_key() {
        log::warn!(
            "No API key configured; set {} or api_key in the config file",
            config.api_key_env
        );
    }

    let client = LlmClient::new(&config).context("Failed to create HTTP client")?;
    let catalog = listings::load_catalog(&config.listings, client.http()).await;
    let rentals = catalog
        .as_ref()
        .map(|catalog| catalog.rentals.clone())
        .unwrap_or_default();
    let system_prompt = listings::system_prompt_for(catalog);

    let session = Arc::new(ChatSession::new(system_prompt, Arc::new(client)));

    match command {
        Commands::Chat => ui::run(session, rentals).await,
        Commands::Ask { message, html } => commands::ask(&session, &message.join(" "), html).await,
        Commands::Prompt => {
            commands::print_prompt(&session);
            Ok(())
        }
        Commands::Listings => {
            commands::print_listings(&rentals);
            Ok(())
        }
    }
}
