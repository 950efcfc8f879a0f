//! touchmesh relay: forwards touch frames between every connected client.
//!
//! Binds to `127.0.0.1:9090` unless `TOUCHMESH_BIND` says otherwise. Log
//! verbosity follows `RUST_LOG`.

use log::info;
use touchmesh_sync::relay::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let mut config = RelayConfig::default();
    if let Ok(addr) = std::env::var("TOUCHMESH_BIND") {
        config.bind_addr = addr;
    }

    info!("Starting touchmesh relay...");
    let relay = RelayServer::new(config);
    relay
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let stats = relay.stats().await;
    info!(
        "Relay stopped after {} connections, {} frames ({} bytes), {} synthesized clears",
        stats.total_connections, stats.total_frames, stats.total_bytes, stats.synthesized_clears
    );
    Ok(())
}
