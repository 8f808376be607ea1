//! WebSocket transport - thin glue between subscribers and the engine.
//!
//! Each connection gets a snapshot of the full instrument set immediately
//! after the handshake, then a JSON text frame per broadcast event. A text
//! frame reading `getAllStocks` fetches a fresh snapshot on demand.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, warn};

use crate::broadcast::{ChannelBroadcaster, SNAPSHOT_EVENT, StockEvent};
use crate::core::{Error, Result};
use crate::ticker::StockTicker;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Accept subscriber connections until shutdown.
pub async fn serve(
    addr: String,
    ticker: Arc<StockTicker>,
    hub: ChannelBroadcaster,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket listener: {}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let ticker = Arc::clone(&ticker);
                let rx = hub.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = handle_subscriber(stream, peer, ticker, rx).await {
                        debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("transport stopping");
                return Ok(());
            }
        }
    }
}

async fn handle_subscriber(
    stream: TcpStream,
    peer: SocketAddr,
    ticker: Arc<StockTicker>,
    mut rx: broadcast::Receiver<StockEvent>,
) -> Result<()> {
    let ws = accept_async(stream)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;
    info!(%peer, "subscriber connected");

    let (mut write, mut read) = ws.split();

    // New subscribers initialize from a snapshot before relying on the
    // broadcast stream.
    send_snapshot(&mut write, &ticker).await?;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let frame = serde_json::to_string(&event)?;
                    write
                        .send(Message::Text(frame.into()))
                        .await
                        .map_err(|e| Error::WebSocket(e.to_string()))?;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // No delivery guarantee; the client catches up from the
                    // next events or re-requests a snapshot.
                    warn!(%peer, missed, "subscriber lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if text.as_str().trim() == "getAllStocks" {
                        send_snapshot(&mut write, &ticker).await?;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
            },
        }
    }

    info!(%peer, "subscriber disconnected");
    Ok(())
}

async fn send_snapshot(write: &mut WsSink, ticker: &StockTicker) -> Result<()> {
    let frame = serde_json::to_string(&json!({
        "event": SNAPSHOT_EVENT,
        "data": ticker.get_all_stocks(),
    }))?;
    write
        .send(Message::Text(frame.into()))
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))
}
