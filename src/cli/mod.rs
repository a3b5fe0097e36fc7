//! Command-line entry points
//!
//! - `serve`: HTTP API
//! - `ask`: one generation from the terminal
//! - `retrieve`: knowledge base lookup without generation

pub mod ask;
pub mod retrieve;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// eService orchestrator - grounded answers across LLM providers
#[derive(Parser)]
#[command(name = "eservice-orchestrator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Answer one customer question
    Ask(ask::AskArgs),

    /// Show the knowledge base passages a question would retrieve
    Retrieve(retrieve::RetrieveArgs),
}

/// Load `.env`, layered configuration and the global subscriber
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging)?;

    Ok(config)
}
