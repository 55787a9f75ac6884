// src/handlers/mod.rs
pub mod adventure;
pub mod images;
pub mod status;
pub mod video;

use crate::error::StudioError;
use crate::middleware;
use crate::AppState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Every API route with the shared state and request logging attached.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(status::status_routes())
        .merge(video::video_routes())
        .merge(images::image_routes())
        .merge(adventure::adventure_routes())
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(Extension(state))
}

impl StudioError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StudioError::EmptyPrompt => StatusCode::BAD_REQUEST,
            StudioError::Conflict(_) => StatusCode::CONFLICT,
            StudioError::SubmissionError(_)
            | StudioError::PollError(_)
            | StudioError::NoResultError
            | StudioError::AssetFetchError(_)
            | StudioError::InvalidStoryResponse(_)
            | StudioError::GenerationError(_) => StatusCode::BAD_GATEWAY,
            StudioError::Playback(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{ "error", "kind" }` body with an explicit status, for errors whose
/// status depends on where they were raised.
pub fn error_response(status: StatusCode, error: &StudioError) -> Response {
    if status.is_server_error() {
        tracing::error!("❌ {} ({})", error, error.kind());
    }
    (status, Json(json!({ "error": error.to_string(), "kind": error.kind() }))).into_response()
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), &self)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::WorkflowConfig;
    use crate::jobs::video_job::test_support::FakeClient;
    use crate::narration::test_support::FakeSynth;
    use crate::speech::ClipStore;
    use crate::AppState;
    use std::sync::Arc;
    use std::time::Duration;

    /// Serve the full API on an ephemeral port; returns its base URL.
    pub async fn spawn_app(client: Arc<FakeClient>) -> (String, Arc<AppState>) {
        let config = WorkflowConfig {
            poll_interval: Duration::from_millis(10),
            progress_cadence: Duration::from_millis(5),
        };
        let state = Arc::new(AppState::new(
            client,
            Arc::new(FakeSynth::default()),
            ClipStore::default(),
            config,
        ));
        let app = super::api_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}", addr), state)
    }
}
