mod fs_util;
mod listen;
mod net_util;

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use dns_core::config::{RunMode, ServerConfig};
use dns_core::store::RecordStore;
use dns_core::upstream::StubResolver;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use listen::{listen_tcp_task, listen_udp_task, Shared};

/// A name-embedding authoritative DNS server.
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Run mode, selects the TTL/port/verbosity presets
    #[clap(long, value_enum, default_value_t = CliMode::Dev)]
    mode: CliMode,

    /// Overrides the mode-default port for all four listeners
    #[clap(long)]
    port: Option<u16>,

    /// Path to the static records file
    #[clap(long)]
    csv: Option<PathBuf>,

    /// Overrides the mode-default TTL
    #[clap(long)]
    ttl: Option<u32>,

    /// Overrides the mode-default log verbosity
    #[clap(long)]
    verbose: Option<bool>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Dev,
    Production,
}

impl From<CliMode> for RunMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Dev => RunMode::Dev,
            CliMode::Production => RunMode::Production,
        }
    }
}

fn begin_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = ServerConfig::new(args.mode.into(), args.port, args.ttl, args.verbose);

    begin_logging(config.verbose);

    let store = match &args.csv {
        Some(path) => match fs_util::store_from_file(path).await {
            Ok(Ok(store)) => store,
            Ok(Err(error)) => {
                tracing::error!(?path, %error, "could not parse records file");
                process::exit(1);
            }
            Err(error) => {
                tracing::error!(?path, ?error, "could not read records file");
                process::exit(1);
            }
        },
        None => RecordStore::new(),
    };

    // The resolver-client capability ALIAS/ANAME delegate to is an
    // external collaborator outside this crate's scope; a `StubResolver`
    // with no configured responses stands in until one is wired up.
    let shared = Arc::new(Shared {
        store: RwLock::new(store),
        default_ttl: config.default_ttl,
        upstream: StubResolver::new(),
    });

    let mut bound = 0u8;

    match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.port)).await {
        Ok(socket) => {
            bound += 1;
            tracing::info!(port = %config.port, "bound UDP/IPv4");
            tokio::spawn(listen_udp_task(shared.clone(), socket));
        }
        Err(error) => tracing::warn!(?error, "could not bind UDP/IPv4"),
    }

    match UdpSocket::bind((Ipv6Addr::UNSPECIFIED, config.port)).await {
        Ok(socket) => {
            bound += 1;
            tracing::info!(port = %config.port, "bound UDP/IPv6");
            tokio::spawn(listen_udp_task(shared.clone(), socket));
        }
        Err(error) => tracing::warn!(?error, "could not bind UDP/IPv6"),
    }

    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).await {
        Ok(listener) => {
            bound += 1;
            tracing::info!(port = %config.port, "bound TCP/IPv4");
            tokio::spawn(listen_tcp_task(shared.clone(), listener));
        }
        Err(error) => tracing::warn!(?error, "could not bind TCP/IPv4"),
    }

    match TcpListener::bind((Ipv6Addr::UNSPECIFIED, config.port)).await {
        Ok(listener) => {
            bound += 1;
            tracing::info!(port = %config.port, "bound TCP/IPv6");
            tokio::spawn(listen_tcp_task(shared.clone(), listener));
        }
        Err(error) => tracing::warn!(?error, "could not bind TCP/IPv6"),
    }

    if bound == 0 {
        tracing::error!("no listener could be bound");
        process::exit(1);
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(error) => tracing::error!(?error, "could not listen for shutdown signal"),
    }
}
