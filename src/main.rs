//! storefront-db - datastore connection lifecycle service
//!
//! This is the composition root that wires together all the components.

use storefront_db::infrastructure::wait_for_signal;
use storefront_db::{
    load_config, ApiServer, ConnectionManager, DatastoreAdapter, ShutdownSignal,
};
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let settings = cfg.datastore_settings()?;
    tracing::info!(
        "starting storefront-db datastore={} pool_max={} listen={}",
        settings.url,
        settings.max_connections,
        cfg.listen_addr
    );

    // ===== COMPOSITION ROOT =====

    // 1. Outbound adapter (lazy, never fails on an unreachable server)
    let datastore = DatastoreAdapter::from_settings(&settings)?;

    // 2. Connection manager: initial connect sequence + periodic probe
    let manager = ConnectionManager::new(datastore, cfg.manager_config());
    manager.start();

    // 3. Inbound adapter
    let server = ApiServer::new(cfg.listen_addr.clone(), manager.clone());
    let mut serving = tokio::spawn(async move { server.run().await });

    let signal = tokio::select! {
        signal = wait_for_signal() => signal,
        result = &mut serving => {
            match result {
                Ok(Ok(())) => tracing::info!("health API exited"),
                Ok(Err(e)) => tracing::error!("health API failed: {:?}", e),
                Err(e) => tracing::error!("health API task failed: {:?}", e),
            }
            ShutdownSignal::Exit
        }
    };

    // A second signal abandons the drain
    let code = tokio::select! {
        outcome = manager.graceful_shutdown(signal) => outcome.exit_code(),
        forced = wait_for_signal() => {
            tracing::warn!("{} received during shutdown, exiting immediately", forced);
            1
        }
    };

    if !serving.is_finished() {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), serving).await;
    }

    std::process::exit(code);
}
