//! Node binary

use clap::{Parser, Subcommand};
use linkstore::common::{Config, SyncPolicy};
use linkstore::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "linkstore")]
#[command(about = "linkstore node: master or caching proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node
    Serve {
        /// TOML config file (flags take priority)
        #[arg(long)]
        config: Option<PathBuf>,

        /// HTTP listen address
        #[arg(long)]
        http: Option<SocketAddr>,

        /// Durable log file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Host name used in short links
        #[arg(long)]
        host: Option<String>,

        /// Enable the RPC endpoint
        #[arg(long)]
        rpc: bool,

        /// Master RPC address; runs this node as a proxy
        #[arg(long)]
        master: Option<String>,

        /// Maximum proxy cache entries
        #[arg(long)]
        cache_capacity: Option<usize>,

        /// Log sync policy
        #[arg(long, value_enum)]
        sync: Option<SyncPolicy>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            http,
            file,
            host,
            rpc,
            master,
            cache_capacity,
            sync,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(http) = http {
                config.http_addr = http;
            }
            if let Some(file) = file {
                config.data_file = file;
            }
            if let Some(host) = host {
                config.hostname = host;
            }
            if rpc {
                config.rpc_enabled = true;
            }
            if master.is_some() {
                config.master_addr = master;
            }
            if cache_capacity.is_some() {
                config.cache_capacity = cache_capacity;
            }
            if let Some(sync) = sync {
                config.sync_policy = sync;
            }
            config.validate()?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.clone().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            Node::new(config).serve().await?;
        }
    }

    Ok(())
}
