//! HTTP gateway for ascanvas.
//!
//! Exposes canvas CRUD and the two transforms as a JSON API, and streams
//! change events to clients as server-sent events.

pub mod routes;
pub mod server;
pub mod service;
pub mod state;

pub use server::{router, start_gateway, start_gateway_with_listener};
pub use service::{BroadcastMode, CanvasService, IdGenerator};
pub use state::GatewayState;
