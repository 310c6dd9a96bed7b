//! Canvas operations: persist a change, then tell observers about it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use ascanvas_core::{
    apply_flood_fill, apply_rectangle, Canvas, CanvasBroadcaster, CanvasError, CanvasEvent,
    CanvasEventName, CanvasRepository, CreateArgs, Result, StopObserve, TransformFloodfillArgs,
    TransformRectangleArgs, OBSERVE_ALL,
};

/// Source of ids for new canvases.
#[derive(Clone)]
pub struct IdGenerator(Arc<dyn Fn() -> String + Send + Sync>);

impl IdGenerator {
    /// Random v4 UUIDs.
    pub fn uuid_v4() -> Self {
        Self(Arc::new(|| uuid::Uuid::new_v4().to_string()))
    }

    /// Always hands out `id`.
    pub fn fixed(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(Arc::new(move || id.clone()))
    }

    pub fn next_id(&self) -> String {
        (self.0)()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::uuid_v4()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdGenerator")
    }
}

/// How change events are handed to the broadcaster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BroadcastMode {
    /// Spawn delivery on the runtime and return right away.
    #[default]
    Async,
    /// Wait for every subscriber to accept the event before returning.
    Sync,
}

pub struct CanvasService {
    repo: Arc<dyn CanvasRepository>,
    broadcaster: Arc<dyn CanvasBroadcaster>,
    ids: IdGenerator,
    mode: BroadcastMode,
    // Load, transform, store must not interleave for the same canvas.
    writes: Mutex<()>,
}

impl CanvasService {
    pub fn new(repo: Arc<dyn CanvasRepository>, broadcaster: Arc<dyn CanvasBroadcaster>) -> Self {
        Self {
            repo,
            broadcaster,
            ids: IdGenerator::default(),
            mode: BroadcastMode::default(),
            writes: Mutex::new(()),
        }
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_broadcast_mode(mut self, mode: BroadcastMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn broadcaster(&self) -> &Arc<dyn CanvasBroadcaster> {
        &self.broadcaster
    }

    pub async fn create(&self, args: CreateArgs) -> Result<Canvas> {
        debug!(name = %args.name, width = args.width, height = args.height, "Creating canvas");

        let canvas = args
            .into_canvas(self.ids.next_id())
            .inspect_err(|e| log_failure("create", "", e))?;
        self.repo
            .create(&canvas)
            .await
            .inspect_err(|e| log_failure("create", &canvas.id, e))?;

        debug!(id = %canvas.id, name = %canvas.name, width = canvas.width, height = canvas.height, "Created canvas");
        self.publish(CanvasEventName::Created, canvas.clone()).await;
        Ok(canvas)
    }

    pub async fn list(&self) -> Result<Vec<Canvas>> {
        let canvases = self
            .repo
            .list()
            .await
            .inspect_err(|e| log_failure("list", "", e))?;
        debug!(count = canvases.len(), "Listed canvases");
        Ok(canvases)
    }

    pub async fn get(&self, id: &str) -> Result<Canvas> {
        self.repo
            .get(id)
            .await
            .inspect_err(|e| log_failure("get", id, e))
    }

    /// Remove a canvas. Observers get its last state with the `DELETED` event.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.writes.lock().await;

        let canvas = self.get(id).await?;
        self.repo
            .delete(id)
            .await
            .inspect_err(|e| log_failure("delete", id, e))?;

        debug!(id, name = %canvas.name, "Deleted canvas");
        self.publish(CanvasEventName::Deleted, canvas).await;
        Ok(())
    }

    /// Subscribe to one canvas, or to all of them when `id` is empty.
    pub async fn observe(&self, id: &str) -> Result<(StopObserve, mpsc::Receiver<CanvasEvent>)> {
        let key = if id.is_empty() { OBSERVE_ALL } else { id };
        self.broadcaster
            .observe(key)
            .await
            .inspect_err(|e| log_failure("observe", key, e))
    }

    pub async fn apply_rectangle(&self, id: &str, args: &TransformRectangleArgs) -> Result<Canvas> {
        debug!(
            id,
            x = args.top_left.x,
            y = args.top_left.y,
            width = args.width,
            height = args.height,
            "Drawing rectangle"
        );
        self.transform(id, "rectangle", |canvas| apply_rectangle(canvas, args))
            .await
    }

    pub async fn apply_flood_fill(&self, id: &str, args: &TransformFloodfillArgs) -> Result<Canvas> {
        debug!(id, x = args.start.x, y = args.start.y, "Flood filling");
        self.transform(id, "floodfill", |canvas| apply_flood_fill(canvas, args))
            .await
    }

    /// Shut the broadcaster down, ending every open subscription.
    pub async fn close(&self) -> Result<()> {
        self.broadcaster.close().await
    }

    async fn transform<F>(&self, id: &str, op: &'static str, apply: F) -> Result<Canvas>
    where
        F: FnOnce(&mut Canvas) -> Result<()>,
    {
        let _guard = self.writes.lock().await;

        let mut canvas = self.get(id).await?;
        apply(&mut canvas).inspect_err(|e| log_failure(op, id, e))?;
        self.repo
            .update(&canvas)
            .await
            .inspect_err(|e| log_failure(op, id, e))?;

        debug!(id, op, width = canvas.width, height = canvas.height, "Updated canvas");
        self.publish(CanvasEventName::Updated, canvas.clone()).await;
        Ok(canvas)
    }

    async fn publish(&self, name: CanvasEventName, canvas: Canvas) {
        let event = CanvasEvent::new(name, canvas);
        match self.mode {
            BroadcastMode::Sync => deliver(self.broadcaster.as_ref(), event).await,
            BroadcastMode::Async => {
                let broadcaster = self.broadcaster.clone();
                tokio::spawn(async move { deliver(broadcaster.as_ref(), event).await });
            }
        }
    }
}

async fn deliver(broadcaster: &dyn CanvasBroadcaster, event: CanvasEvent) {
    let (name, id) = (event.name, event.target().to_string());
    if let Err(e) = broadcaster.broadcast(event).await {
        error!(%e, id = %id, event = %name, "Failed to broadcast event");
    }
}

fn log_failure(op: &str, id: &str, err: &CanvasError) {
    if matches!(err, CanvasError::NotFound(_)) || err.is_client_error() {
        debug!(op, id, %err, "Canvas operation rejected");
    } else {
        error!(op, id, %err, "Canvas operation failed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ascanvas_broadcast::MemoryBroadcaster;
    use ascanvas_core::store::MemoryCanvasStore;
    use ascanvas_core::Coordinates;
    use tokio::time::timeout;

    use super::*;

    fn service() -> CanvasService {
        CanvasService::new(
            Arc::new(MemoryCanvasStore::new()),
            Arc::new(MemoryBroadcaster::new()),
        )
        .with_broadcast_mode(BroadcastMode::Sync)
    }

    fn create_args(name: &str, fill: &str, width: i64, height: i64) -> CreateArgs {
        CreateArgs {
            name: name.into(),
            fill: fill.into(),
            width,
            height,
        }
    }

    async fn next(rx: &mut mpsc::Receiver<CanvasEvent>) -> CanvasEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event in time")
            .expect("open channel")
    }

    #[tokio::test]
    async fn test_create_fills_canvas() {
        let svc = service().with_id_generator(IdGenerator::fixed("c1"));
        let canvas = svc.create(create_args("Test 1", "X", 3, 2)).await.unwrap();

        assert_eq!(canvas.id, "c1");
        assert_eq!(canvas.content, "XXXXXX");
        assert_eq!(svc.get("c1").await.unwrap(), canvas);
    }

    #[tokio::test]
    async fn test_create_defaults_to_blank_fill() {
        let svc = service();
        let canvas = svc.create(create_args("blank", "", 2, 2)).await.unwrap();
        assert_eq!(canvas.content, "    ");
        assert_eq!(uuid::Uuid::parse_str(&canvas.id).unwrap().get_version_num(), 4);
    }

    #[tokio::test]
    async fn test_create_reports_every_violation() {
        let svc = service();
        let err = svc.create(create_args("", "XY", 0, -1)).await.unwrap_err();
        let CanvasError::InvalidArgument(msg) = err else {
            panic!("expected InvalidArgument, got {err:?}");
        };
        assert_eq!(
            msg,
            "name cannot be empty, fill must be exactly one character, \
             width cannot be less than 1, height cannot be less than 1"
        );
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fixed_id_collides_on_second_create() {
        let svc = service().with_id_generator(IdGenerator::fixed("same"));
        svc.create(create_args("a", "X", 1, 1)).await.unwrap();
        assert!(matches!(
            svc.create(create_args("b", "X", 1, 1)).await,
            Err(CanvasError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let svc = service();
        assert!(matches!(svc.get("nope").await, Err(CanvasError::NotFound(_))));
        assert!(matches!(svc.delete("nope").await, Err(CanvasError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_events_follow_each_change() {
        let svc = service().with_id_generator(IdGenerator::fixed("c1"));
        let (_stop, mut rx) = svc.observe("").await.unwrap();

        svc.create(create_args("c", ".", 3, 3)).await.unwrap();
        let created = next(&mut rx).await;
        assert_eq!(created.name, CanvasEventName::Created);

        let rect = TransformRectangleArgs {
            top_left: Coordinates::new(0, 0),
            width: 2,
            height: 2,
            fill: "X".into(),
            outline: String::new(),
        };
        let updated = svc.apply_rectangle("c1", &rect).await.unwrap();
        assert_eq!(updated.content, "XX.XX....");
        let event = next(&mut rx).await;
        assert_eq!(event.name, CanvasEventName::Updated);
        assert_eq!(event.canvas, updated);

        let fill = TransformFloodfillArgs {
            start: Coordinates::new(2, 2),
            fill: "O".into(),
        };
        let filled = svc.apply_flood_fill("c1", &fill).await.unwrap();
        assert_eq!(filled.content, "XXOXXOOOO");
        assert_eq!(next(&mut rx).await.canvas, filled);

        svc.delete("c1").await.unwrap();
        let deleted = next(&mut rx).await;
        assert_eq!(deleted.name, CanvasEventName::Deleted);
        assert_eq!(deleted.canvas, filled);
    }

    #[tokio::test]
    async fn test_observe_single_canvas_ignores_others() {
        let svc = service().with_id_generator(IdGenerator::fixed("c1"));
        svc.create(create_args("c", ".", 2, 2)).await.unwrap();
        let (_stop, mut rx) = svc.observe("c1").await.unwrap();

        let other = CanvasService::new(svc.repo.clone(), svc.broadcaster.clone())
            .with_broadcast_mode(BroadcastMode::Sync)
            .with_id_generator(IdGenerator::fixed("c2"));
        other.create(create_args("d", ".", 2, 2)).await.unwrap();

        let fill = TransformFloodfillArgs {
            start: Coordinates::new(0, 0),
            fill: "#".into(),
        };
        svc.apply_flood_fill("c1", &fill).await.unwrap();

        let event = next(&mut rx).await;
        assert_eq!(event.canvas.id, "c1");
        assert_eq!(event.canvas.content, "####");
    }

    #[tokio::test]
    async fn test_failed_transform_leaves_canvas_untouched() {
        let svc = service().with_id_generator(IdGenerator::fixed("c1"));
        let original = svc.create(create_args("c", ".", 3, 3)).await.unwrap();
        let (_stop, mut rx) = svc.observe("c1").await.unwrap();

        let fill = TransformFloodfillArgs {
            start: Coordinates::new(5, 5),
            fill: "O".into(),
        };
        assert!(matches!(
            svc.apply_flood_fill("c1", &fill).await,
            Err(CanvasError::OutOfBounds)
        ));
        assert_eq!(svc.get("c1").await.unwrap(), original);
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_async_mode_still_delivers() {
        let svc = service()
            .with_broadcast_mode(BroadcastMode::Async)
            .with_id_generator(IdGenerator::fixed("c1"));
        let (_stop, mut rx) = svc.observe("c1").await.unwrap();

        svc.create(create_args("c", ".", 1, 1)).await.unwrap();
        assert_eq!(next(&mut rx).await.name, CanvasEventName::Created);
    }

    #[tokio::test]
    async fn test_close_ends_observers() {
        let svc = service();
        let (_stop, mut rx) = svc.observe("").await.unwrap();
        svc.close().await.unwrap();

        assert!(rx.recv().await.is_none());
        assert!(matches!(svc.observe("x").await, Err(CanvasError::Closed)));
        // Changes still succeed once nobody can listen.
        svc.create(create_args("c", ".", 1, 1)).await.unwrap();
    }
}
