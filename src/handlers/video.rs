// src/handlers/video.rs
//! Video screen endpoints: submit, snapshot, download, narration, leave.

use crate::error::StudioError;
use crate::jobs::AssetHandle;
use crate::speech::PCM_SAMPLE_RATE;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct SubmitVideoRequest {
    pub prompt: String,
}

/// POST /api/video - Start generating a video, replacing any current one
pub async fn submit_video(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SubmitVideoRequest>,
) -> Result<Response, StudioError> {
    let snapshot = state.video_screen.submit(request.prompt).await?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)).into_response())
}

/// GET /api/video - Current state of the video screen
pub async fn get_video(Extension(state): Extension<Arc<AppState>>) -> Result<Response, StudioError> {
    let snapshot = state.video_screen.snapshot().await?;
    Ok(Json(snapshot).into_response())
}

/// DELETE /api/video - Leave the screen; the local asset is released
pub async fn leave_video(Extension(state): Extension<Arc<AppState>>) -> Result<Response, StudioError> {
    let snapshot = state.video_screen.leave().await?;
    Ok(Json(snapshot).into_response())
}

/// GET /api/video/assets/:handle - Download the finished video
pub async fn download_asset(
    Path(handle): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, StudioError> {
    let Some(handle) = AssetHandle::parse(&handle) else {
        return Ok((StatusCode::NOT_FOUND, "Video not found").into_response());
    };

    match state.video_screen.asset(handle).await? {
        Some(asset) => {
            tracing::info!("📥 Serving {} ({} bytes)", asset.file_name, asset.bytes.len());
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, asset.mime_type.clone()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", asset.file_name),
                    ),
                ],
                asset.bytes.as_ref().clone(),
            )
                .into_response())
        }
        None => Ok((StatusCode::NOT_FOUND, "Video not found").into_response()),
    }
}

/// POST /api/video/narration - Start or stop narration playback
pub async fn toggle_narration(Extension(state): Extension<Arc<AppState>>) -> Result<Response, StudioError> {
    let snapshot = state.video_screen.toggle_narration().await?;
    Ok(Json(snapshot).into_response())
}

/// GET /api/video/narration/audio - Most recently rendered narration clip
pub async fn narration_audio(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.narration_clips.latest() {
        Some(clip) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, format!("audio/L16;rate={}", PCM_SAMPLE_RATE)),
                (header::CONTENT_LANGUAGE, clip.language_code.clone()),
            ],
            clip.audio.as_ref().clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "No narration audio available").into_response(),
    }
}

pub fn video_routes() -> Router {
    Router::new()
        .route("/api/video", post(submit_video).get(get_video).delete(leave_video))
        .route("/api/video/assets/:handle", get(download_asset))
        .route("/api/video/narration", post(toggle_narration))
        .route("/api/video/narration/audio", get(narration_audio))
}
