use clap::Parser;
use log::info;
use server::clock::SystemClock;
use server::config::Args;
use server::network::Server;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();

    info!("Starting motion bridge on {}", config.bind_address());
    info!(
        "Session TTL {}s, read TTL {}ms, capacity {}",
        config.sweep.session_ttl.as_secs(),
        config.read_ttl_ms,
        config.store.max_sessions
    );

    let server = Server::new(config, Arc::new(SystemClock)).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
