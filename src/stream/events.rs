//! Typed event surface exposed to application consumers.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::stream::proto::Tweet;

/// Event published while a stream connection is alive.
///
/// Delivery order matches arrival order of the underlying records; the
/// client performs no reordering or buffering beyond frame reassembly.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// The stream connection is established.
    Connected,
    /// A status matched the filter.
    NewTweet(Tweet),
    /// Statuses were dropped server-side; carries the delta since the last
    /// report.
    MissedTweets {
        /// Number of newly dropped statuses.
        missed: u64,
    },
    /// A transport or request failure; fatal for the current connection.
    TwitterError {
        /// Human-readable failure description.
        message: String,
    },
    /// The stream went silent past the keepalive timeout; a forced
    /// reconnect follows.
    TwitterDown,
    /// The connection is torn down.
    Disconnected,
}

/// Fan-out registry for [`StreamEvent`] subscribers.
///
/// Subscribers register before `connect()`; each receives every event in
/// publish order. Subscribers whose receiver has been dropped are pruned on
/// the next publish.
#[derive(Clone, Debug, Default)]
pub struct EventPublisher {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<StreamEvent>>>>,
}

impl EventPublisher {
    /// Creates a publisher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and returns its event receiver.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(event_tx);
        }
        event_rx
    }

    /// Delivers `event` to every live subscriber.
    pub fn publish(&self, event: StreamEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
