//! Canvas stores: an in-memory map and a JSON file on disk.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::canvas::Canvas;
use crate::error::{CanvasError, Result};
use crate::repository::CanvasRepository;

fn sort_canvases(canvases: &mut [Canvas]) {
    canvases.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Volatile store; contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryCanvasStore {
    canvases: RwLock<HashMap<String, Canvas>>,
}

impl MemoryCanvasStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CanvasRepository for MemoryCanvasStore {
    async fn create(&self, canvas: &Canvas) -> Result<()> {
        let mut canvases = self.canvases.write().await;
        if canvases.contains_key(&canvas.id) {
            return Err(CanvasError::AlreadyExists(canvas.id.clone()));
        }
        canvases.insert(canvas.id.clone(), canvas.clone());
        Ok(())
    }

    async fn update(&self, canvas: &Canvas) -> Result<()> {
        let mut canvases = self.canvases.write().await;
        match canvases.get_mut(&canvas.id) {
            Some(existing) => {
                *existing = canvas.clone();
                Ok(())
            }
            None => Err(CanvasError::NotFound(canvas.id.clone())),
        }
    }

    async fn get(&self, id: &str) -> Result<Canvas> {
        self.canvases
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CanvasError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Canvas>> {
        let mut canvases: Vec<Canvas> = self.canvases.read().await.values().cloned().collect();
        sort_canvases(&mut canvases);
        Ok(canvases)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.canvases
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CanvasError::NotFound(id.to_string()))
    }
}

/// File-based store keeping every canvas in one JSON document.
///
/// Layout:
/// - `<base>/canvases.json`: array of `Canvas`
pub struct JsonCanvasStore {
    base: PathBuf,
    // Serializes read-modify-write cycles on the index file.
    write_lock: Mutex<()>,
}

impl JsonCanvasStore {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            write_lock: Mutex::new(()),
        }
    }

    /// Default store location: `~/.ascanvas/canvases/`
    pub fn default_path() -> PathBuf {
        crate::config::data_dir().join("canvases")
    }

    fn index_path(&self) -> PathBuf {
        self.base.join("canvases.json")
    }

    async fn load_index(&self) -> Result<Vec<Canvas>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let canvases: Vec<Canvas> = serde_json::from_str(&data)?;
        for canvas in &canvases {
            canvas.validate().map_err(|e| {
                CanvasError::Storage(format!("corrupt canvas {}: {e}", canvas.id))
            })?;
        }
        Ok(canvases)
    }

    async fn save_index(&self, canvases: &[Canvas]) -> Result<()> {
        tokio::fs::create_dir_all(&self.base).await?;
        let data = serde_json::to_string_pretty(canvases)?;
        let path = self.index_path();
        // Atomic write: write to temp then rename
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl CanvasRepository for JsonCanvasStore {
    async fn create(&self, canvas: &Canvas) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut canvases = self.load_index().await?;
        if canvases.iter().any(|c| c.id == canvas.id) {
            return Err(CanvasError::AlreadyExists(canvas.id.clone()));
        }
        canvases.push(canvas.clone());
        self.save_index(&canvases).await?;
        debug!(id = %canvas.id, "Stored canvas");
        Ok(())
    }

    async fn update(&self, canvas: &Canvas) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut canvases = self.load_index().await?;
        let existing = canvases
            .iter_mut()
            .find(|c| c.id == canvas.id)
            .ok_or_else(|| CanvasError::NotFound(canvas.id.clone()))?;
        *existing = canvas.clone();
        self.save_index(&canvases).await?;
        debug!(id = %canvas.id, "Updated canvas");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Canvas> {
        self.load_index()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CanvasError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Canvas>> {
        let mut canvases = self.load_index().await?;
        sort_canvases(&mut canvases);
        Ok(canvases)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut canvases = self.load_index().await?;
        let before = canvases.len();
        canvases.retain(|c| c.id != id);
        if canvases.len() == before {
            return Err(CanvasError::NotFound(id.to_string()));
        }
        self.save_index(&canvases).await?;
        debug!(id, "Deleted canvas");
        Ok(())
    }
}
