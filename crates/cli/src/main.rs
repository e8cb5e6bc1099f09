//! Inkwell CLI: the main entry point.
//!
//! Commands:
//! - `init`     Write the default config
//! - `chat`     Interactive or single-message coaching
//! - `stats`    Memory statistics for a user
//! - `patterns` Detected usage or error patterns
//! - `prompts`  Prompt optimizer report

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "inkwell",
    about = "Inkwell: an essay coach that learns from every session",
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
    /// Write the default configuration file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Chat with the essay coach
    Chat {
        /// User whose memory and profile to use
        #[arg(short, long, default_value = "default", env = "INKWELL_USER")]
        user: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show memory statistics
    Stats {
        #[arg(short, long, env = "INKWELL_USER")]
        user: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show detected usage patterns, or error patterns with --errors
    Patterns {
        #[arg(short, long, env = "INKWELL_USER")]
        user: String,

        #[arg(long)]
        errors: bool,

        /// Lookback in days
        #[arg(long, default_value_t = 7)]
        days: i64,

        /// Only show patterns resembling this text
        #[arg(long)]
        like: Option<String>,
    },

    /// Show the prompt optimizer report
    Prompts {
        #[arg(short, long, env = "INKWELL_USER")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Chat { user, message } => commands::chat::run(&user, message).await?,
        Commands::Stats { user, json } => commands::stats::run(&user, json).await?,
        Commands::Patterns {
            user,
            errors,
            days,
            like,
        } => commands::patterns::run(&user, errors, days, like.as_deref()).await?,
        Commands::Prompts { user } => commands::prompts::run(&user).await?,
    }

    Ok(())
}
