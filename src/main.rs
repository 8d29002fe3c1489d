// netfirst binary.
// Parses the command line, sets up logging, and runs the proxy or a cache command.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use netfirst::Result;
use netfirst::config::{CacheCommand, CacheConfig, Cli, Command, resolve_target};
use netfirst::http::{HttpNetwork, Network, Request};
use netfirst::server;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("netfirst: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netfirst=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Serve(config) => {
            let registration = server::prepare(&config).await?;
            server::serve(&config, registration).await
        }
        Command::Cache { command } => run_cache(command).await,
    }
}

async fn run_cache(command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Add {
            targets,
            origin,
            cache,
        } => {
            let storage = cache.storage()?;
            let network = HttpNetwork::new()?;
            for target in targets {
                let request = Request::get(resolve_target(origin.as_ref(), &target)?);
                let response = network.fetch(&request).await?;
                storage.put(&cache.cache_name, &request, &response)?;
                println!(
                    "cached {} ({}, {} bytes)",
                    request.url,
                    response.status,
                    response.body.len()
                );
            }
            Ok(())
        }
        CacheCommand::Ls { cache } => list(&cache),
        CacheCommand::Rm {
            targets,
            origin,
            cache,
        } => {
            let storage = cache.storage()?;
            for target in targets {
                let request = Request::get(resolve_target(origin.as_ref(), &target)?);
                if storage.delete(&cache.cache_name, &request)? {
                    println!("removed {}", request.url);
                } else {
                    println!("not cached: {}", request.url);
                }
            }
            Ok(())
        }
        CacheCommand::Clear { cache } => {
            let storage = cache.storage()?;
            if storage.delete_cache(&cache.cache_name)? {
                println!("cleared {}", cache.cache_name);
            } else {
                println!("no cache named {}", cache.cache_name);
            }
            Ok(())
        }
    }
}

fn list(cache: &CacheConfig) -> Result<()> {
    let storage = cache.storage()?;
    let names = storage.cache_names()?;
    if names.is_empty() {
        println!("no caches in {}", storage.base().display());
        return Ok(());
    }

    for name in names {
        let entries = storage.keys(&name)?;
        println!("{} ({} entries)", name, entries.len());
        for entry in entries {
            println!(
                "  {} {:>8} {}  {}",
                entry.status,
                entry.size,
                entry.cached_at.format("%Y-%m-%d %H:%M:%S"),
                entry.url
            );
        }
    }
    Ok(())
}
