//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// postflight: idempotent publish service for social platforms
#[derive(Parser, Debug)]
#[command(name = "postflight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP publish service
    Serve(ServeArgs),

    /// One-shot publish of a strategy from the command line
    Publish(PublishArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the listen host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Strategy id to publish. Omit to create a strategy from --content.
    #[arg(long, conflicts_with = "content")]
    pub strategy_id: Option<String>,

    /// Post text for an ad-hoc strategy
    #[arg(long, conflicts_with = "strategy_id")]
    pub content: Option<String>,

    /// Target platform (linkedin, twitter, x)
    #[arg(long)]
    pub platform: String,

    /// Acting user id (defaults to the configured default user)
    #[arg(long)]
    pub user: Option<String>,

    /// Optional title for an ad-hoc strategy
    #[arg(long)]
    pub title: Option<String>,

    /// Optional image URL attached to the post
    #[arg(long)]
    pub image_url: Option<String>,

    /// Publish to a stub instead of the real platform
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
