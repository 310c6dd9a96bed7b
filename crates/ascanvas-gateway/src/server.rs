//! Axum-based HTTP server.

use std::future::Future;
use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::routes;
use crate::state::GatewayState;

/// Build the gateway router.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api", get(routes::list_canvases).post(routes::create_canvas))
        .route("/api/events", get(routes::observe_all))
        .route(
            "/api/{id}",
            get(routes::get_canvas).delete(routes::delete_canvas),
        )
        .route("/api/{id}/events", get(routes::observe_canvas))
        .route("/api/{id}/rectangle", patch(routes::draw_rectangle))
        .route("/api/{id}/floodfill", patch(routes::flood_fill))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until CTRL+C.
pub async fn start_gateway(state: Arc<GatewayState>, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Gateway listening on {}", listener.local_addr()?);
    start_gateway_with_listener(state, listener, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// The broadcaster is closed as soon as shutdown begins so that open event
/// streams end and graceful shutdown does not wait on them.
pub async fn start_gateway_with_listener(
    state: Arc<GatewayState>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            if let Err(e) = state.service.close().await {
                error!(%e, "Failed to close broadcaster");
            }
        })
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");

    axum::Json(json!({
        "status": "ok",
        "version": version,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use ascanvas_broadcast::MemoryBroadcaster;
    use ascanvas_core::store::MemoryCanvasStore;

    use super::*;
    use crate::service::{BroadcastMode, CanvasService, IdGenerator};

    fn app() -> Router {
        let service = CanvasService::new(
            Arc::new(MemoryCanvasStore::new()),
            Arc::new(MemoryBroadcaster::new()),
        )
        .with_broadcast_mode(BroadcastMode::Sync)
        .with_id_generator(IdGenerator::fixed("c1"));
        router(Arc::new(GatewayState::from_service(service)))
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let app = app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api",
                r#"{"name":"c","fill":"-","width":2,"height":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["content"], "--");

        let response = app
            .oneshot(Request::get("/api/c1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], "c1");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = app()
            .oneshot(json_request("POST", "/api", "{ nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_create_is_bad_request() {
        let response = app()
            .oneshot(json_request("POST", "/api", r#"{"name":"","width":1,"height":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "invalid input: name cannot be empty"
        );
    }

    #[tokio::test]
    async fn test_event_routes_open_streams() {
        let app = app();
        for uri in ["/api/events", "/api/c1/events"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["content-type"], "text/event-stream");
        }
    }

    #[tokio::test]
    async fn test_oversized_create_is_bad_request() {
        let response = app()
            .oneshot(json_request(
                "POST",
                "/api",
                r#"{"name":"big","fill":"x","width":4294967296,"height":4294967296}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_canvas_is_not_found() {
        let app = app();
        for request in [
            Request::get("/api/missing").body(Body::empty()).unwrap(),
            Request::delete("/api/missing").body(Body::empty()).unwrap(),
            json_request(
                "PATCH",
                "/api/missing/floodfill",
                r#"{"start":{"x":0,"y":0},"fill":"x"}"#,
            ),
        ] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}
