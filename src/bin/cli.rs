//! CLI for store operations against an RPC-enabled node

use clap::{Parser, Subcommand};
use linkstore::rpc::{HttpChannel, Method, RemoteCallChannel};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "linkstore-cli")]
#[command(about = "linkstore command line client")]
#[command(version)]
struct Cli {
    /// Node address (must run with --rpc)
    #[arg(long, default_value = "http://localhost:8080")]
    node: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a code
    Get {
        /// Code
        code: String,
    },

    /// Store a target and print its code
    Put {
        /// Target URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let channel = HttpChannel::new(&cli.node, Duration::from_millis(cli.timeout_ms))?;

    match cli.command {
        Commands::Get { code } => match channel.call(Method::Get, &code).await {
            Ok(url) => println!("{}", url),
            Err(e) if e.is_not_found() => {
                eprintln!("{}: not found", code);
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },

        Commands::Put { url } => {
            let code = channel.call(Method::Put, &url).await?;
            println!("{}", code);
        }
    }

    Ok(())
}
