use clap::Parser;
use std::path::PathBuf;

pub mod commands;
mod execute;
pub mod output;

pub use commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "storegate")]
#[command(
    about = "Browse the catalog and manage an account through the storegate gateway",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the XDG config location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Remote API base URL, overriding the configuration
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}
