//! Chatshop CLI - Database migrations and manual testing tools.
//!
//! # Usage
//!
//! ```bash
//! # Run orders database migrations
//! chatshop migrate
//!
//! # Insert the demo catalog and customers
//! chatshop seed
//!
//! # Print the confirmation token for a proposal
//! chatshop sign --proposal "$(cat proposal.json)"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed the demo catalog
//! - `sign` - Sign a proposal with `ORDERS_PROPOSAL_SECRET`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "chatshop")]
#[command(author, version, about = "Chatshop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run orders database migrations
    Migrate,
    /// Seed the demo catalog and customers
    Seed,
    /// Print the confirmation token for a proposal
    Sign {
        /// Proposal JSON, exactly as it will be sent to `POST /orders`
        #[arg(short, long)]
        proposal: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed => commands::seed::demo().await?,
        Commands::Sign { proposal } => {
            let token = commands::sign::token(&proposal)?;
            #[allow(clippy::print_stdout)]
            {
                println!("{token}");
            }
        }
    }
    Ok(())
}
