use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use wrgl_objects::InMemoryObjectStore;
use wrgl_refs::InMemoryRefStore;
use wrgl_server::{ServerConfig, WrglServer};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args),
    }
}

/// Load the config file, if any, then apply command-line overrides.
fn resolve_config(overrides: &ConfigOverrides) -> anyhow::Result<ServerConfig> {
    let mut config = match &overrides.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = overrides.bind {
        config.bind_addr = bind;
    }
    if let Some(size) = overrides.max_packfile_size {
        config.max_packfile_size = size;
    }
    config.deny_deletes |= overrides.deny_deletes;
    config.deny_non_fast_forwards |= overrides.deny_non_fast_forwards;
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args.overrides)?;
    println!(
        "{} wrgl server on {}",
        "✓".green().bold(),
        config.bind_addr.to_string().bold()
    );
    tracing::debug!(?config, "resolved configuration");
    let server = WrglServer::new(
        config,
        Arc::new(InMemoryObjectStore::new()),
        Arc::new(InMemoryRefStore::new()),
    );
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args.overrides)?;
    print!("{}", toml::to_string(&config)?);
    Ok(())
}
