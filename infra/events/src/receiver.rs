use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Lag-tolerant helpers for tap receivers.
pub trait EventReceiverExt<T> {
    /// Receive the next event, returning `None` when the channel is closed.
    ///
    /// A lagging receiver skips ahead to the oldest retained event.
    fn recv_event(&mut self) -> impl Future<Output = Option<Arc<T>>> + Send;

    /// Takes every event already buffered without waiting.
    fn drain(&mut self) -> Vec<Arc<T>>;
}

impl<T: Send + Sync + 'static> EventReceiverExt<T> for broadcast::Receiver<Arc<T>> {
    async fn recv_event(&mut self) -> Option<Arc<T>> {
        let mut skipped = 0u64;

        loop {
            match self.recv().await {
                Ok(event) => {
                    if skipped > 0 {
                        warn!(
                            event = std::any::type_name::<T>(),
                            skipped = skipped,
                            "Event tap lagged; continuing from latest message"
                        );
                    }
                    return Some(event);
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    skipped = skipped.saturating_add(n);
                    debug!(
                        event = std::any::type_name::<T>(),
                        skipped = n,
                        total_skipped = skipped,
                        "Event tap lagged; accumulating skipped events"
                    );
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn drain(&mut self) -> Vec<Arc<T>> {
        let mut out = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => out.push(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(event = std::any::type_name::<T>(), skipped = n, "Event tap lagged");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return out,
            }
        }
    }
}
