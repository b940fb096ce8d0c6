//! Kickoff CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway and the succession sweeper
//! - `route`: Show how a message would be routed, without executing it
//! - `capabilities`: List capability owners, capabilities and commands
//! - `doctor`: Diagnose configuration and collaborators

use clap::{Parser, Subcommand};
use kickoff_core::scope::ChatScope;

mod commands;

#[derive(Parser)]
#[command(
    name = "kickoff",
    about = "Kickoff — request routing, permissions and answer validation for a team chat bot",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "KICKOFF_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Route a message and print the decision
    Route {
        /// Message text, e.g. "/players" or "who is on the team?"
        #[arg(short, long)]
        text: String,

        /// Chat scope the message comes from
        #[arg(short, long, default_value = "open")]
        scope: ChatScope,

        /// Requester identity
        #[arg(short, long, default_value = "cli")]
        requester: String,

        /// Team scope id
        #[arg(long, default_value = "default")]
        team: String,

        /// Treat the text as a structured command even without a leading `/`
        #[arg(long)]
        structured: bool,
    },

    /// List capability owners and their capabilities
    Capabilities,

    /// Diagnose configuration and collaborators
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Route {
            text,
            scope,
            requester,
            team,
            structured,
        } => commands::route::run(text, scope, requester, team, structured).await?,
        Commands::Capabilities => commands::capabilities::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
