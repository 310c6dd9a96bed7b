//! Core types for ascanvas: the canvas model, grid transforms, change
//! events, configuration, errors, and canvas storage.

pub mod canvas;
pub mod config;
pub mod error;
pub mod event;
pub mod repository;
pub mod store;
pub mod transform;

pub use canvas::{Canvas, Coordinates, CreateArgs, Grid};
pub use error::{CanvasError, Result};
pub use event::{CanvasBroadcaster, CanvasEvent, CanvasEventName, StopObserve, OBSERVE_ALL};
pub use repository::CanvasRepository;
pub use transform::{apply_flood_fill, apply_rectangle, TransformFloodfillArgs, TransformRectangleArgs};
