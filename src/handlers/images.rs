// src/handlers/images.rs
use crate::error::StudioError;
use crate::generation::validate_image_count;
use crate::handlers::error_response;
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct GenerateImagesRequest {
    pub prompt: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub file_name: String,
    pub mime_type: String,
    pub data_url: String,
}

#[derive(Serialize)]
pub struct GenerateImagesResponse {
    pub prompt: String,
    pub images: Vec<GeneratedImage>,
}

/// POST /api/images - Generate 1 to 4 still images from a prompt
pub async fn generate_images(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<GenerateImagesRequest>,
) -> Result<Response, StudioError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(StudioError::EmptyPrompt);
    }
    // Out-of-range counts are the caller's mistake, not an upstream failure.
    if let Err(e) = validate_image_count(request.count) {
        return Ok(error_response(StatusCode::BAD_REQUEST, &e));
    }

    tracing::info!("🖼️ Generating {} image(s) for '{}'", request.count, prompt);
    let blobs = state.generation_client.generate_still_images(prompt, request.count).await?;

    let images = blobs
        .iter()
        .enumerate()
        .map(|(i, blob)| GeneratedImage {
            file_name: format!("gemini-image-{}.jpg", i + 1),
            mime_type: blob.mime_type.clone(),
            data_url: blob.data_url(),
        })
        .collect();

    Ok(Json(GenerateImagesResponse {
        prompt: prompt.to_string(),
        images,
    })
    .into_response())
}

pub fn image_routes() -> Router {
    Router::new().route("/api/images", post(generate_images))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::spawn_app;
    use crate::jobs::video_job::test_support::FakeClient;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_images_are_named_in_order() {
        let (base, _state) = spawn_app(Arc::new(FakeClient::new())).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/images", base))
            .json(&json!({ "prompt": "a lion in the snow", "count": 3 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        let images = body["images"].as_array().unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0]["fileName"], "gemini-image-1.jpg");
        assert_eq!(images[2]["fileName"], "gemini-image-3.jpg");
        assert!(images[1]["dataUrl"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_count_out_of_range_is_rejected() {
        let (base, _state) = spawn_app(Arc::new(FakeClient::new())).await;
        let http = reqwest::Client::new();

        for count in [0, 7] {
            let response = http
                .post(format!("{}/api/images", base))
                .json(&json!({ "prompt": "a lion", "count": count }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 400);
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["kind"], "generation_error");
            assert!(body["error"].as_str().unwrap().contains(&count.to_string()));
        }

        let empty = http
            .post(format!("{}/api/images", base))
            .json(&json!({ "prompt": "  ", "count": 2 }))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), 400);
        let body: Value = empty.json().await.unwrap();
        assert_eq!(body["kind"], "empty_prompt");
    }
}
