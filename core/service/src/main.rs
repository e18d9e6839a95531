use anyhow::Result;
use clap::Parser;
use moodring_service::{router, telemetry::init_tracing, AppState, ConfigArgs, ServiceConfig};
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "moodring-service")]
#[command(about = "HTTP API for the moodring journal and its reflections")]
struct Args {
    /// Address to listen on [env: MOODRING_ADDR]
    #[arg(long)]
    addr: Option<SocketAddr>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    info!("Moodring Service v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = ServiceConfig::load(&args.config)?;
    if let Some(addr) = args.addr {
        config.addr = addr;
    }

    let state = AppState::open(&config)?;
    let app = router(state);

    info!("Starting HTTP server on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
