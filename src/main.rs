//! Main entry point for the EPUB translator CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epub_translator::cli::commands::{self, Commands};

/// EPUB Translator - book translation with caching and cost tracking
#[derive(Parser, Debug)]
#[command(name = "epub-translator", version, about, long_about = None)]
struct Args {
    /// API key for DeepSeek (optional, defaults to DEEPSEEK_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    let log_level = if std::env::var("RUST_LOG").is_ok() {
        std::env::var("RUST_LOG").unwrap()
    } else {
        "info".to_string()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}={}", env!("CARGO_PKG_NAME"), log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Override config with CLI args if provided
    if let Some(api_key) = args.api_key {
        std::env::set_var("DEEPSEEK_API_KEY", api_key);
    }

    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }

    // Execute command
    match args.command {
        Some(Commands::Translate {
            file,
            output,
            max_concurrent,
            reset,
        }) => {
            commands::handle_translate(file, output, max_concurrent, reset).await?;
        }
        Some(Commands::Estimate { file }) => {
            commands::handle_estimate(file).await?;
        }
        Some(Commands::ResetCache { file }) => {
            commands::handle_reset_cache(file).await?;
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
        }
    }

    Ok(())
}
