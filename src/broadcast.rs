//! Fan-out seam between the engine and the transport.
//!
//! The engine only knows `Broadcaster`: one fire-and-forget method, no
//! acknowledgment, no retry, no per-subscriber failure reporting. The
//! production implementation pushes into a tokio broadcast channel that the
//! WebSocket transport subscribes to; slow subscribers lag and drop.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::{Result, Stock};

/// Event name for a single changed stock.
pub const UPDATE_EVENT: &str = "updateStockPrice";
/// Event name for the full instrument set sent to new subscribers.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// Wire envelope for one changed stock.
#[derive(Debug, Clone, Serialize)]
pub struct StockEvent {
    pub event: String,
    pub data: Stock,
}

/// Delivery collaborator the engine emits through.
pub trait Broadcaster: Send + Sync {
    /// Deliver `stock` under `event` to every connected subscriber.
    /// Fire-and-forget: the engine does not wait for delivery.
    fn broadcast(&self, event: &str, stock: &Stock) -> Result<()>;
}

/// Production broadcaster over a tokio broadcast channel.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<StockEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Hand a receiver to a transport connection.
    pub fn subscribe(&self) -> broadcast::Receiver<StockEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, event: &str, stock: &Stock) -> Result<()> {
        // A send error only means nobody is subscribed right now; that is
        // not a delivery failure under the no-guarantee contract.
        let _ = self.tx.send(StockEvent {
            event: event.to_string(),
            data: stock.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Symbol;
    use rust_decimal_macros::dec;

    #[test]
    fn broadcast_with_no_subscribers_is_ok() {
        let hub = ChannelBroadcaster::new(16);
        let stock = Stock::new(Symbol::new("MSFT"), dec!(30.31));
        assert!(hub.broadcast(UPDATE_EVENT, &stock).is_ok());
    }

    #[test]
    fn subscriber_receives_event() {
        let hub = ChannelBroadcaster::new(16);
        let mut rx = hub.subscribe();
        let stock = Stock::new(Symbol::new("GOOG"), dec!(570.30));
        hub.broadcast(UPDATE_EVENT, &stock).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, UPDATE_EVENT);
        assert_eq!(event.data.symbol.as_str(), "GOOG");
        assert_eq!(event.data.price, dec!(570.30));
    }

    #[test]
    fn event_serializes_to_wire_shape() {
        let stock = Stock::new(Symbol::new("MSFT"), dec!(30.31));
        let event = StockEvent {
            event: UPDATE_EVENT.to_string(),
            data: stock,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "updateStockPrice");
        assert_eq!(json["data"]["symbol"], "MSFT");
    }
}
