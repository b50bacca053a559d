use std::net::SocketAddr;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use paxos_rsm::config::{NodeConfig, PeerConfig};
use paxos_rsm::kv::KvServer;
use paxos_rsm::node::Node;
use paxos_rsm::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "paxos-rsm")]
#[command(version)]
#[command(about = "A replicated key/value store on a Paxos log")]
struct Args {
    /// Index of this peer in the peer set
    #[arg(long, default_value = "0")]
    index: usize,

    /// Port to listen on for peer gRPC
    #[arg(long, default_value = "50051")]
    port: u16,

    /// Peer set (comma-separated, format: "index:host:port")
    /// Example: "0:127.0.0.1:50051,1:127.0.0.1:50052,2:127.0.0.1:50053"
    #[arg(long, default_value = "")]
    peers: String,

    /// Deadline for a single peer call in milliseconds
    #[arg(long, default_value = "500")]
    rpc_timeout_ms: u64,
}

fn parse_peers(peers_str: &str) -> Vec<PeerConfig> {
    if peers_str.is_empty() {
        return Vec::new();
    }

    peers_str
        .split(',')
        .filter_map(|peer| {
            let parts: Vec<&str> = peer.trim().split(':').collect();
            if parts.len() == 3 {
                let index: usize = parts[0].parse().ok()?;
                let addr = format!("{}:{}", parts[1], parts[2]);
                Some(PeerConfig { index, addr })
            } else {
                tracing::warn!(peer, "Invalid peer format, expected index:host:port");
                None
            }
        })
        .collect()
}

/// Execute one stdin command against the store
async fn run_command(kv: &KvServer, line: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let key = parts.next();
    let value = parts.next();

    match (command, key, value) {
        ("get", Some(key), None) => Ok(kv
            .get(key)
            .await?
            .unwrap_or_else(|| "(no such key)".to_string())),
        ("put", Some(key), Some(value)) => {
            kv.put(key, value).await?;
            Ok("OK".to_string())
        }
        ("append", Some(key), Some(value)) => {
            kv.append(key, value).await?;
            Ok("OK".to_string())
        }
        _ => Ok("usage: get KEY | put KEY VALUE | append KEY VALUE".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let mut peers = parse_peers(&args.peers);
    if !peers.iter().any(|p| p.index == args.index) {
        peers.push(PeerConfig {
            index: args.index,
            addr: format!("127.0.0.1:{}", args.port),
        });
    }

    let config = NodeConfig {
        peers,
        rpc_timeout_ms: args.rpc_timeout_ms,
        ..NodeConfig::new(args.index, listen_addr)
    };

    tracing::info!(
        peer = config.peer_index,
        listen_addr = %config.listen_addr,
        peers = ?config.peers.iter().map(|p| format!("{}:{}", p.index, p.addr)).collect::<Vec<_>>(),
        "Starting paxos-rsm node"
    );

    let node = Node::new(config)?;
    let shutdown = install_shutdown_handler();
    let server = node.serve(shutdown.clone());
    node.kill_on_shutdown(shutdown.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed: keep serving peers until a signal arrives
                    shutdown.cancelled().await;
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // A command without a quorum waits indefinitely; a signal must still win
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = run_command(&node.kv, line) => match result {
                        Ok(output) => println!("{}", output),
                        Err(e) => eprintln!("error: {}", e),
                    },
                }
            }
        }
    }

    shutdown.cancel();
    node.shutdown().await;
    server.await??;

    Ok(())
}
