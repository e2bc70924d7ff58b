//! Connection lifecycle events.
//!
//! Every connection publishes [`ConnectionEvent`]s on a broadcast channel and
//! mirrors them as tracing events. Publishing never blocks and never fails:
//! with no subscribers the event is simply dropped.

use std::time::Duration;

use quarry_core::{Dialect, Parameter};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the event channel; slow subscribers lag rather than block.
const EVENT_CAPACITY: usize = 256;

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A pooled client was acquired.
    Connect,
    /// The client was released.
    Disconnect,
    /// A statement completed.
    Query {
        /// The SQL as sent to the driver.
        sql: String,
        /// The bound values.
        bindings: Vec<Parameter>,
        /// Wall time of the round trip.
        elapsed: Duration,
    },
    /// A statement or lifecycle call failed.
    Error {
        /// The error message.
        message: String,
    },
}

/// Sender side of a connection's event channel.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    dialect: Dialect,
    sender: broadcast::Sender<ConnectionEvent>,
}

impl EventBus {
    pub(crate) fn new(dialect: Dialect) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { dialect, sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Connect => info!(dialect = %self.dialect, "Connected"),
            ConnectionEvent::Disconnect => info!(dialect = %self.dialect, "Disconnected"),
            ConnectionEvent::Query {
                sql,
                bindings,
                elapsed,
            } => debug!(
                dialect = %self.dialect,
                sql = %sql,
                bindings = bindings.len(),
                elapsed_ms = elapsed.as_millis(),
                "Executed query"
            ),
            ConnectionEvent::Error { message } => {
                warn!(dialect = %self.dialect, error = %message, "Database error");
            }
        }
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    pub(crate) fn error(&self, message: impl ToString) {
        self.emit(ConnectionEvent::Error {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        EventBus::new(Dialect::Sqlite).emit(ConnectionEvent::Connect);
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = EventBus::new(Dialect::Postgres);
        let mut events = bus.subscribe();
        bus.emit(ConnectionEvent::Connect);
        bus.error("boom");

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connect);
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Error {
                message: "boom".into()
            }
        );
    }
}
