use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve `POST /api/metadata` over HTTP
    Daemon {
        /// Address to listen on, overrides server.listen_addr from config.yaml
        #[clap(short, long)]
        listen: Option<String>,
    },
    /// Resolve metadata for a single url and print it as JSON
    Meta {
        /// Anything a user might type into an address bar
        url: String,
    },
    /// Print the normalized form of a url without fetching it
    Normalize {
        /// Anything a user might type into an address bar
        url: String,
    },
}
