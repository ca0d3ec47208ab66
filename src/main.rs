use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod metadata;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use metadata::{ResolveError, Resolver};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    let config = Config::load()?;

    match args.command {
        cli::Command::Daemon { listen } => web::start_daemon(config, listen),

        cli::Command::Meta { url } => {
            let resolver = Resolver::from_config(&config.fetch)?;
            let result = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(resolver.resolve(&url));

            match result {
                Ok(meta) => {
                    println!("{}", serde_json::to_string_pretty(&meta)?);
                    Ok(())
                }
                Err(ResolveError::InvalidUrl { normalized_url }) => {
                    bail!("invalid url: {normalized_url}")
                }
                Err(err) => Err(err.into()),
            }
        }

        cli::Command::Normalize { url } => {
            let normalized = metadata::normalize::normalize(&url)?;
            println!("{normalized}");
            Ok(())
        }
    }
}
