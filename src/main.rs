use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use stock_ticker::broadcast::ChannelBroadcaster;
use stock_ticker::config::AppConfig;
use stock_ticker::ticker::StockTicker;
use stock_ticker::transport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logger
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stock_ticker=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 2. Load config and wire the engine together. The ticker is an
    // explicit instance owned here, handed by Arc to whoever needs it.
    let config = AppConfig::load_default();
    let hub = ChannelBroadcaster::new(256);
    let ticker = Arc::new(StockTicker::new(&config.ticker, Arc::new(hub.clone()))?);

    tracing::info!(
        "🦀 stock-ticker starting ({} stocks, {}ms interval, ws://{})",
        ticker.get_all_stocks().len(),
        ticker.tick_interval().as_millis(),
        config.listen_addr
    );

    // 3. Background tasks: the tick loop and the subscriber transport
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let ticker_task = tokio::spawn(Arc::clone(&ticker).run(shutdown_rx.clone()));
    let transport_task = tokio::spawn(transport::serve(
        config.listen_addr.clone(),
        Arc::clone(&ticker),
        hub,
        shutdown_rx,
    ));

    // 4. Run until ctrl-c; an in-flight cycle finishes before exit
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = ticker_task.await;
    if let Ok(Err(e)) = transport_task.await {
        tracing::error!("transport error: {}", e);
    }

    Ok(())
}
