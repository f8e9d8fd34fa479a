//! Ringmesh Server - Rendezvous Manager for Ring Overlays

use clap::{Parser, Subcommand};
use ringmesh_server::config::ServerConfig;
use ringmesh_server::observability::{init_metrics, init_tracing, TracingConfig};
use ringmesh_server::server::Server;
use ringmesh_server::version;
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser)]
#[command(name = "ringmesh-server")]
#[command(about = "Rendezvous manager that forms and maintains a ring of peers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the manager
    Run {
        /// UDP address to receive commands on
        #[arg(long, env = "RINGMESH_BIND")]
        bind: Option<SocketAddr>,

        /// Serve Prometheus metrics on this address
        #[arg(long, env = "RINGMESH_METRICS_ADDR")]
        metrics_addr: Option<SocketAddr>,

        /// Seed member selection for reproducible rings
        #[arg(long, env = "RINGMESH_SEED")]
        seed: Option<u64>,
    },
    /// Print build information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("{}", version::build_info());
            Ok(())
        }
        Commands::Run {
            bind,
            metrics_addr,
            seed,
        } => {
            let mut config = ServerConfig::from_env();
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if metrics_addr.is_some() {
                config.metrics_addr = metrics_addr;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            run(config).await
        }
    }
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(TracingConfig::from_env()).map_err(|e| anyhow::anyhow!(e))?;

    info!(version = %version::full_version(), "Starting ringmesh-server");

    if let Some(addr) = config.metrics_addr {
        init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
    }

    let server = Server::bind(&config).await?;
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("ringmesh-server stopped");
    Ok(())
}
