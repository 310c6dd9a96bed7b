//! REST handlers for `/api` and the server-sent event streams.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, KeepAliveStream, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use ascanvas_core::{
    Canvas, CanvasError, CanvasEvent, CreateArgs, StopObserve, TransformFloodfillArgs,
    TransformRectangleArgs,
};

use crate::state::GatewayState;

type ApiResult<T> = Result<T, ApiError>;

type EventStream = Sse<KeepAliveStream<ObservedStream>>;

/// Error response with a `{"error": "..."}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CanvasError> for ApiError {
    fn from(err: CanvasError) -> Self {
        let status = match &err {
            CanvasError::InvalidArgument(_) | CanvasError::OutOfBounds => StatusCode::BAD_REQUEST,
            CanvasError::NotFound(_) => StatusCode::NOT_FOUND,
            CanvasError::AlreadyExists(_) => StatusCode::CONFLICT,
            CanvasError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

// Any body that doesn't parse as the expected JSON is the client's fault.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub async fn create_canvas(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<CreateArgs>, JsonRejection>,
) -> ApiResult<Json<Canvas>> {
    let Json(args) = payload?;
    Ok(Json(state.service.create(args).await?))
}

pub async fn list_canvases(State(state): State<Arc<GatewayState>>) -> ApiResult<Json<Vec<Canvas>>> {
    Ok(Json(state.service.list().await?))
}

pub async fn get_canvas(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Canvas>> {
    Ok(Json(state.service.get(&id).await?))
}

pub async fn delete_canvas(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn draw_rectangle(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    payload: Result<Json<TransformRectangleArgs>, JsonRejection>,
) -> ApiResult<Json<Canvas>> {
    let Json(args) = payload?;
    Ok(Json(state.service.apply_rectangle(&id, &args).await?))
}

pub async fn flood_fill(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    payload: Result<Json<TransformFloodfillArgs>, JsonRejection>,
) -> ApiResult<Json<Canvas>> {
    let Json(args) = payload?;
    Ok(Json(state.service.apply_flood_fill(&id, &args).await?))
}

/// Events for every canvas.
pub async fn observe_all(State(state): State<Arc<GatewayState>>) -> ApiResult<EventStream> {
    observe(&state, "").await
}

/// Events for one canvas.
pub async fn observe_canvas(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult<EventStream> {
    observe(&state, &id).await
}

async fn observe(state: &GatewayState, id: &str) -> ApiResult<EventStream> {
    let (stop, rx) = state.service.observe(id).await?;
    tracing::debug!(id, "Event stream opened");
    Ok(Sse::new(ObservedStream::new(stop, rx)).keep_alive(KeepAlive::default()))
}

/// SSE body for one subscription. Dropping it (client gone, or the
/// response finished) unsubscribes.
pub struct ObservedStream {
    events: ReceiverStream<CanvasEvent>,
    stop: StopObserve,
}

impl ObservedStream {
    fn new(stop: StopObserve, rx: mpsc::Receiver<CanvasEvent>) -> Self {
        Self {
            events: ReceiverStream::new(rx),
            stop,
        }
    }
}

impl Stream for ObservedStream {
    type Item = Result<Event, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events)
            .poll_next(cx)
            .map(|event| event.map(|e| to_sse(&e)))
    }
}

impl Drop for ObservedStream {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

fn to_sse(event: &CanvasEvent) -> Result<Event, axum::Error> {
    Event::default()
        .event(event.name.as_str())
        .json_data(&event.canvas)
}
