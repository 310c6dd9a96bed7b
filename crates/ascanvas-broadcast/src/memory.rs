//! In-process broadcaster backed by a locked subscriber registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::debug;

use ascanvas_core::{
    CanvasBroadcaster, CanvasError, CanvasEvent, Result, StopObserve, OBSERVE_ALL,
};

/// Slots per subscriber channel. `broadcast` returns once the event sits in
/// the slot, before the subscriber has read it. A sender waits once its slot
/// is taken, so an idle subscriber holds up the next broadcast that targets it.
const DELIVERY_BUFFER: usize = 1;

#[derive(Default)]
struct Registry {
    /// canvas id (or [`OBSERVE_ALL`]) -> subscription key -> channel
    listeners: HashMap<String, HashMap<u64, mpsc::Sender<CanvasEvent>>>,
    counter: u64,
    closed: bool,
}

impl Registry {
    fn remove(&mut self, id: &str, key: u64) -> bool {
        let Some(bucket) = self.listeners.get_mut(id) else {
            return false;
        };
        let removed = bucket.remove(&key).is_some();
        if bucket.is_empty() {
            self.listeners.remove(id);
        }
        removed
    }

    fn targets(&self, id: &str) -> Vec<mpsc::Sender<CanvasEvent>> {
        let mut buckets = vec![id];
        if id != OBSERVE_ALL {
            buckets.push(OBSERVE_ALL);
        }
        buckets
            .into_iter()
            .filter_map(|b| self.listeners.get(b))
            .flat_map(|bucket| bucket.values().cloned())
            .collect()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fan-out of canvas events to subscribers living in this process.
///
/// The registry lock is only held long enough to add, remove, or snapshot
/// subscriptions; sends happen outside it. Whole broadcasts are serialized
/// by a separate delivery lock, so every subscriber sees events in
/// broadcast order.
pub struct MemoryBroadcaster {
    registry: Arc<Mutex<Registry>>,
    delivery: tokio::sync::Mutex<()>,
}

impl Default for MemoryBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroadcaster {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            delivery: tokio::sync::Mutex::new(()),
        }
    }

    /// Live subscriptions across every bucket.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).listeners.values().map(HashMap::len).sum()
    }

    fn stop_handle(registry: Weak<Mutex<Registry>>, id: String, key: u64) -> StopObserve {
        StopObserve::new(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            if lock(&registry).remove(&id, key) {
                debug!(id = %id, key, "Stopped observing");
            }
        })
    }
}

#[async_trait]
impl CanvasBroadcaster for MemoryBroadcaster {
    async fn observe(&self, id: &str) -> Result<(StopObserve, mpsc::Receiver<CanvasEvent>)> {
        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);

        let key = {
            let mut registry = lock(&self.registry);
            if registry.closed {
                return Err(CanvasError::Closed);
            }
            registry.counter += 1;
            let key = registry.counter;
            registry
                .listeners
                .entry(id.to_string())
                .or_default()
                .insert(key, tx);
            key
        };

        debug!(id, key, "Observing");
        let stop = Self::stop_handle(Arc::downgrade(&self.registry), id.to_string(), key);
        Ok((stop, rx))
    }

    async fn broadcast(&self, event: CanvasEvent) -> Result<()> {
        let _turn = self.delivery.lock().await;

        let targets = {
            let registry = lock(&self.registry);
            if registry.closed {
                return Ok(());
            }
            registry.targets(event.target())
        };

        if targets.is_empty() {
            return Ok(());
        }

        // Each send owns its sender clone and releases it once that
        // subscriber accepts, so `close` can end every channel that isn't
        // itself stalled. A send only fails when the receiver is gone.
        let subscribers = targets.len();
        let sends = targets.into_iter().map(|tx| {
            let event = event.clone();
            async move { tx.send(event).await }
        });
        let delivered = join_all(sends).await.iter().filter(|r| r.is_ok()).count();

        debug!(
            id = %event.target(),
            event = %event.name,
            subscribers,
            delivered,
            "Broadcast event"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut registry = lock(&self.registry);
        registry.closed = true;
        let dropped: usize = registry.listeners.values().map(HashMap::len).sum();
        // Dropping the senders closes every subscriber channel.
        registry.listeners.clear();
        debug!(dropped, "Broadcaster closed");
        Ok(())
    }
}
