//! Gateway shared state.

use std::sync::Arc;

use ascanvas_core::{CanvasBroadcaster, CanvasRepository};

use crate::service::CanvasService;

/// Shared state handed to every request handler.
pub struct GatewayState {
    pub service: CanvasService,
}

impl GatewayState {
    pub fn new(repo: Arc<dyn CanvasRepository>, broadcaster: Arc<dyn CanvasBroadcaster>) -> Self {
        Self::from_service(CanvasService::new(repo, broadcaster))
    }

    pub fn from_service(service: CanvasService) -> Self {
        Self { service }
    }
}
