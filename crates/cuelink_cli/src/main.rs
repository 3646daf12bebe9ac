//! CueLink CLI
//!
//! Runs the CueLink sync server standalone, without the desktop app.
//!
//! # Commands
//!
//! - `serve` - Start the server over a cue-stack file or a demo stack

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CueLink standalone server.
#[derive(Parser)]
#[command(name = "cuelink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sync server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        /// Path of the credential store file
        #[arg(short, long, default_value = "cuelink_credentials.json")]
        store: PathBuf,

        /// Cue-stack JSON file to serve (a demo stack when omitted)
        #[arg(long)]
        stacks: Option<PathBuf>,

        /// Seed the default admin account when the store is empty
        #[arg(long)]
        seed_admin: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            store,
            stacks,
            seed_admin,
        } => {
            commands::serve::run(bind, &store, stacks.as_deref(), seed_admin).await?;
        }
    }

    Ok(())
}
