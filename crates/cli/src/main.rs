//! NextGen CLI - Database migrations and local development tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply server database migrations
//! nextgen-cli migrate
//!
//! # Print a bearer token for a customer (local testing)
//! nextgen-cli token customer cus_01J...
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `token customer` - Issue a customer bearer token

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nextgen-cli")]
#[command(author, version, about = "NextGen CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Issue bearer tokens
    Token {
        #[command(subcommand)]
        kind: TokenKind,
    },
}

#[derive(Subcommand)]
enum TokenKind {
    /// Sign a one-hour customer token with `JWT_SECRET`
    Customer {
        /// Customer ID (`cus_...`)
        customer_id: String,
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
        Commands::Token { kind } => match kind {
            TokenKind::Customer { customer_id } => {
                let token = commands::token::customer(&customer_id)?;
                #[allow(clippy::print_stdout)]
                {
                    println!("{token}");
                }
            }
        },
    }
    Ok(())
}
