//! Canvas persistence contract.

use async_trait::async_trait;

use crate::canvas::Canvas;
use crate::error::Result;

/// Storage backend for canvases.
///
/// Callers serialize writes per canvas id; implementations only need to
/// keep their own bookkeeping consistent under concurrent use.
#[async_trait]
pub trait CanvasRepository: Send + Sync {
    /// Store a new canvas. Fails with `AlreadyExists` if the id is taken.
    async fn create(&self, canvas: &Canvas) -> Result<()>;

    /// Replace a stored canvas. Fails with `NotFound` if the id is unknown.
    async fn update(&self, canvas: &Canvas) -> Result<()>;

    /// Load a canvas by id. Fails with `NotFound` if the id is unknown.
    async fn get(&self, id: &str) -> Result<Canvas>;

    /// All stored canvases, ordered by name then id.
    async fn list(&self) -> Result<Vec<Canvas>>;

    /// Remove a canvas. Fails with `NotFound` if the id is unknown.
    async fn delete(&self, id: &str) -> Result<()>;
}
