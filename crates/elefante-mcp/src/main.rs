//! Elefante MCP Server - persistent memory for AI agents
//!
//! A Model Context Protocol server over the Elefante orchestration core:
//!
//! - Canonical-identity dedup: ADD / REINFORCE / SUPERSEDE / CONTRADICT
//! - Dual store: vector collection + labeled property graph, consistent
//!   under a transaction-scoped host-wide write lock
//! - Composite retrieval with per-signal explanations and constellations
//! - Search-before-write compliance gate per session

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use elefante_core::{CoreConfig, EmbeddingProvider, HashedEmbedder, Orchestrator};

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

/// Parse command-line arguments and return the optional data directory.
/// Exits the process on `--help` / `--version`.
fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("Elefante MCP Server v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Dual-store AI agent memory over the Model Context Protocol.");
                println!();
                println!("USAGE:");
                println!("    elefante-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Custom data root");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG               Log level filter (e.g., debug, info, warn)");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("elefante-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with("--data-dir=") => {
                let path = arg.strip_prefix("--data-dir=").unwrap_or("");
                if path.is_empty() {
                    eprintln!("error: --data-dir requires a path argument");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(path));
            }
            arg => {
                eprintln!("error: unknown argument '{}'", arg);
                eprintln!("Try 'elefante-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    data_dir
}

/// Pick the embedding provider: the local model when it loads, otherwise the
/// deterministic hashed fallback so the server still functions offline.
fn select_embedder() -> Arc<dyn EmbeddingProvider> {
    #[cfg(feature = "embeddings")]
    {
        let provider = elefante_core::FastembedProvider::new();
        if provider.is_ready() {
            info!("Embedding model ready: {}", provider.model_name());
            return Arc::new(provider);
        }
        warn!("Embedding model unavailable; falling back to hashed embeddings");
    }
    Arc::new(HashedEmbedder::default())
}

#[tokio::main]
async fn main() {
    let data_dir = parse_args();

    // stdout carries JSON-RPC only; all logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("Elefante MCP Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let embedder = select_embedder();

    let config = CoreConfig {
        data_root: data_dir,
        ..Default::default()
    };

    let core = match Orchestrator::open(config, embedder) {
        Ok(core) => {
            info!("Orchestration core initialized");
            Arc::new(core)
        }
        Err(e) => {
            error!("Failed to initialize core: {}", e);
            std::process::exit(1);
        }
    };

    let server = McpServer::new(core);
    let transport = StdioTransport::new();

    info!("Starting MCP server on stdio...");

    if let Err(e) = transport.run(server).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Elefante MCP Server shutting down");
}
