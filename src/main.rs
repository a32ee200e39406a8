use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use tunwarden::config::Config;
use tunwarden::server::{self, AppState};
use tunwarden::supervisor::Supervisor;
use tunwarden::telemetry::TelemetryStore;

/// Supervise a tun-proxy child and republish its telemetry to a dashboard
#[derive(Parser)]
#[command(name = "tunwarden")]
#[command(about = "TUN proxy supervisor and telemetry backend", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP surface to (overrides the config file)
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// HTTP port to serve on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the tun-proxy binary (overrides the config file)
    #[arg(long)]
    proxy_bin: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.http_port = port;
    }
    if let Some(bin) = cli.proxy_bin {
        config.proxy_bin = bin;
    }
    debug!(?config, "resolved configuration");

    let store = Arc::new(TelemetryStore::new(config.log_retention));
    let supervisor = Arc::new(Supervisor::new(config.clone(), Arc::clone(&store)));

    let addr = SocketAddr::new(config.bind, config.http_port);
    server::serve(AppState { supervisor, store }, addr).await?;
    Ok(())
}
