use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wrgl", about = "Sync server for wrgl table repositories", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the sync endpoints over HTTP
    Serve(ServeArgs),
    /// Print the effective server configuration as TOML
    Config(ConfigArgs),
}

/// Overrides shared by every command that reads the server configuration.
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Flush threshold for one packfile, in bytes
    #[arg(long)]
    pub max_packfile_size: Option<u64>,
    /// Reject pushes that delete refs
    #[arg(long)]
    pub deny_deletes: bool,
    /// Reject pushes that are not fast-forwards
    #[arg(long)]
    pub deny_non_fast_forwards: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}
