//! Canvas change events and the broadcaster contract.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::canvas::Canvas;
use crate::error::Result;

/// Reserved identifier whose subscribers receive events for every canvas.
pub const OBSERVE_ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanvasEventName {
    /// A new canvas has been created.
    Created,
    /// An existing canvas has been updated.
    Updated,
    /// An existing canvas has been deleted.
    Deleted,
}

impl CanvasEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for CanvasEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A moment-in-time snapshot of a canvas change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasEvent {
    pub name: CanvasEventName,
    pub canvas: Canvas,
}

impl CanvasEvent {
    pub fn new(name: CanvasEventName, canvas: Canvas) -> Self {
        Self { name, canvas }
    }

    /// Identifier of the canvas this event is about.
    pub fn target(&self) -> &str {
        &self.canvas.id
    }
}

/// Removes one subscription from its broadcaster.
///
/// Stopping drops the subscription's sender, so the paired receiver ends
/// once any in-flight delivery to it has finished; it does not wait for
/// the broadcaster to be closed.
///
/// Calling [`StopObserve::stop`] more than once is a no-op, as is calling
/// it after the broadcaster has been closed.
pub struct StopObserve(Box<dyn Fn() + Send + Sync>);

impl StopObserve {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn stop(&self) {
        (self.0)()
    }
}

impl fmt::Debug for StopObserve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StopObserve")
    }
}

/// Fan-out of canvas events to live observers.
#[async_trait]
pub trait CanvasBroadcaster: Send + Sync {
    /// Subscribe to events for canvas `id`, or every canvas for [`OBSERVE_ALL`].
    async fn observe(&self, id: &str) -> Result<(StopObserve, mpsc::Receiver<CanvasEvent>)>;

    /// Deliver `event` to every subscriber of its canvas and of [`OBSERVE_ALL`].
    ///
    /// Returns once every matching subscriber has accepted the event. With a
    /// buffered channel, accepted means queued on it, not yet received.
    async fn broadcast(&self, event: CanvasEvent) -> Result<()>;

    /// Close every subscriber channel. Terminal.
    async fn close(&self) -> Result<()>;
}
