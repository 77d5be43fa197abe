//! linekv-cli - interactive client
//!
//! Connects to a running server, or with `--embedded` runs an in-process
//! store, and serves a `> ` prompt on stdin/stdout.

use anyhow::Context;
use clap::Parser;
use linekv::cli::{self, Backend};
use linekv::client::TcpClient;
use linekv::commands::CommandHandler;
use linekv::storage::StorageEngine;
use std::sync::Arc;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(name = "linekv-cli", version, about = "Interactive linekv client", long_about = None)]
struct Args {
    /// Server address.
    #[arg(short, long, default_value = linekv::DEFAULT_ADDRESS)]
    addr: String,

    /// Largest response read per request, in bytes.
    #[arg(long, default_value_t = linekv::client::DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Run against an in-process store instead of a server.
    #[arg(long)]
    embedded: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let backend = if args.embedded {
        Backend::Embedded(CommandHandler::new(Arc::new(StorageEngine::new())))
    } else {
        let client = TcpClient::connect(&args.addr)
            .await
            .with_context(|| format!("failed init client for {}", args.addr))?
            .with_buffer_size(args.buffer_size);
        Backend::Remote(client)
    };

    let input = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = cli::run(input, tokio::io::stdout(), backend) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nbye");
            Ok(())
        }
    }
}
