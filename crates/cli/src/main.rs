//! T-Shirt Studio CLI - database migrations and usage management.
//!
//! # Usage
//!
//! ```bash
//! # Run API database migrations
//! ts-cli migrate
//!
//! # Show a creator's token usage
//! ts-cli usage show u_123
//!
//! # Set or remove a creator's monthly limit
//! ts-cli usage set-limit u_123 50000
//! ts-cli usage set-limit u_123 unlimited
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::usage::MonthlyLimit;

#[derive(Parser)]
#[command(name = "ts-cli")]
#[command(author, version, about = "T-Shirt Studio CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run API database migrations
    Migrate,
    /// Inspect and manage creator token usage
    Usage {
        #[command(subcommand)]
        action: UsageAction,
    },
}

#[derive(Subcommand)]
enum UsageAction {
    /// Show a creator's usage counters
    Show {
        /// Creator account ID
        creator_id: String,
    },
    /// Set a creator's monthly token limit
    SetLimit {
        /// Creator account ID
        creator_id: String,

        /// Token limit, or `unlimited`
        limit: MonthlyLimit,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Usage { action } => match action {
            UsageAction::Show { creator_id } => commands::usage::show(&creator_id).await?,
            UsageAction::SetLimit { creator_id, limit } => {
                commands::usage::set_limit(&creator_id, limit).await?;
            }
        },
    }
    Ok(())
}
