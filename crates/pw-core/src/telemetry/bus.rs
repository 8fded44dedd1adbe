//! In-process publish/subscribe for telemetry events.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::event::TelemetryEvent;

/// A subscriber callback. Returned errors are logged and otherwise ignored.
pub type Handler = Arc<dyn Fn(&TelemetryEvent) -> anyhow::Result<()> + Send + Sync>;

type Registry = Mutex<Vec<(u64, Handler)>>;

/// Fan-out of telemetry events to any number of subscribers.
///
/// Cloning yields another handle to the same bus. Handlers run synchronously
/// on the publishing thread; a handler that errors or panics does not stop
/// the others.
#[derive(Clone, Default)]
pub struct TelemetryBus {
    handlers: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for TelemetryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl TelemetryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` until the returned subscription is unsubscribed.
    ///
    /// Dropping the [`Subscription`] without calling `unsubscribe` keeps the
    /// handler registered.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TelemetryEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers).push((id, Arc::new(handler)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.handlers),
        }
    }

    /// Delivers `event` to every handler registered at the time of the call.
    pub fn publish(&self, event: &TelemetryEvent) {
        let snapshot: Vec<Handler> = lock(&self.handlers).iter().map(|(_, h)| h.clone()).collect();
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("Telemetry subscriber failed on {}: {}", event.kind, e),
                Err(_) => tracing::debug!("Telemetry subscriber panicked on {}", event.kind),
            }
        }
    }

    /// Removes every handler.
    pub fn clear(&self) {
        lock(&self.handlers).clear();
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.handlers).len()
    }
}

/// Handle returned by [`TelemetryBus::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Removes the handler. A no-op when the bus is gone or already cleared.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(registry: &Registry) -> MutexGuard<'_, Vec<(u64, Handler)>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::kinds;
    use std::sync::atomic::AtomicUsize;

    fn event() -> TelemetryEvent {
        TelemetryEvent::new(kinds::REQUEST_SENT, "stage", "Request sent")
    }

    #[test]
    fn failing_subscriber_does_not_block_others() {
        let bus = TelemetryBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_| anyhow::bail!("boom"));
        bus.subscribe(|_| panic!("listener bug"));
        let counter = seen.clone();
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&event());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = TelemetryBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sub = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&event());
        sub.unsubscribe();
        bus.publish(&event());

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn clear_removes_all() {
        let bus = TelemetryBus::new();
        bus.subscribe(|_| Ok(()));
        bus.subscribe(|_| Ok(()));
        assert_eq!(bus.subscriber_count(), 2);
        bus.clear();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
