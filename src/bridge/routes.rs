use super::picker::FilePicker;
use crate::session::{FrameOutcome, FrameSession, SessionError};
use anyhow::anyhow;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const APP_JS: &str = include_str!("../../web/app.js");

// Rendered overlays arrive as full-resolution PNG data URIs
const MAX_OVERLAY_BYTES: usize = 64 * 1024 * 1024;

/// Shared handle to the one session; calls are serialized by the mutex
#[derive(Clone)]
pub struct BridgeState {
    session: Arc<Mutex<FrameSession>>,
    picker: Arc<dyn FilePicker>,
}

impl BridgeState {
    pub fn new(session: FrameSession, picker: Arc<dyn FilePicker>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            picker,
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, FrameSession>, ApiError> {
        self.session
            .lock()
            .map_err(|_| ApiError::Session(SessionError::Backend(anyhow!("session lock poisoned"))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct CombineRequest {
    pub image: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Session(SessionError),
    Worker(tokio::task::JoinError),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(
                SessionError::NotReady | SessionError::NoCurrentFrame | SessionError::Finalized,
            ) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::Overlay(_)) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::Backend(_)) | ApiError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Session(e) => format!("{e:#}"),
            ApiError::Worker(e) => format!("bridge worker failed: {e}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = self.message();
        if status.is_server_error() {
            tracing::error!("Bridge call failed: {}", error_message);
        } else {
            tracing::warn!("Rejected bridge call: {}", error_message);
        }

        let body = serde_json::json!({
            "error": error_message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

pub fn create_router(state: BridgeState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .route("/api/get_video_path", post(get_video_path))
        .route("/api/process", post(process))
        .route("/api/combine_result", post(combine_result))
        .layer(DefaultBodyLimit::max(MAX_OVERLAY_BYTES))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn app_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript")], APP_JS)
}

/// Run a session call on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::Worker)?
}

async fn get_video_path(State(state): State<BridgeState>) -> Result<Json<Option<FrameSize>>, ApiError> {
    blocking(move || {
        let Some(path) = state.picker.pick_video() else {
            tracing::info!("No video selected");
            return Ok(Json(None));
        };
        let (width, height) = state.lock_session()?.open(&path)?;
        Ok(Json(Some(FrameSize { width, height })))
    })
    .await
}

async fn process(State(state): State<BridgeState>) -> Result<Json<FrameOutcome>, ApiError> {
    blocking(move || Ok(Json(state.lock_session()?.next_frame()?))).await
}

async fn combine_result(
    State(state): State<BridgeState>,
    Json(request): Json<CombineRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        state
            .lock_session()?
            .combine_result(request.image.as_deref())?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}
