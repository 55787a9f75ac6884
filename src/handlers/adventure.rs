// src/handlers/adventure.rs
//! Adventure endpoints. The story log lives for the lifetime of the process.

use crate::adventure::AdventureView;
use crate::error::StudioError;
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct StartRequest {
    pub genre: String,
}

#[derive(Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

/// GET /api/adventure - Story so far and the scene on screen
pub async fn get_adventure(Extension(state): Extension<Arc<AppState>>) -> Json<AdventureView> {
    Json(state.adventure.view().await)
}

/// POST /api/adventure/start - Begin a new story in the given genre
pub async fn start_adventure(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<AdventureView>, StudioError> {
    Ok(Json(state.adventure.start(&request.genre).await?))
}

/// POST /api/adventure/action - Send the player's next action
pub async fn send_action(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<AdventureView>, StudioError> {
    Ok(Json(state.adventure.act(&request.action).await?))
}

/// DELETE /api/adventure - Back to the menu, clearing the story
pub async fn back_to_menu(Extension(state): Extension<Arc<AppState>>) -> Json<AdventureView> {
    Json(state.adventure.back_to_menu().await)
}

pub fn adventure_routes() -> Router {
    Router::new()
        .route("/api/adventure", get(get_adventure).delete(back_to_menu))
        .route("/api/adventure/start", post(start_adventure))
        .route("/api/adventure/action", post(send_action))
}

#[cfg(test)]
mod tests {
    use crate::error::StudioError;
    use crate::generation::SceneResult;
    use crate::handlers::test_support::spawn_app;
    use crate::jobs::video_job::test_support::FakeClient;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn scene(text: &str) -> SceneResult {
        SceneResult {
            scene_text: text.to_string(),
            image_prompt: text.to_string(),
            image_url: "data:image/jpeg;base64,/9j/".to_string(),
        }
    }

    #[tokio::test]
    async fn test_adventure_over_http() {
        let client = Arc::new(
            FakeClient::new()
                .with_scene(Ok(scene("A lantern flickers.")))
                .with_scene(Err(StudioError::InvalidStoryResponse("prose".to_string()))),
        );
        let (base, _state) = spawn_app(client).await;
        let http = reqwest::Client::new();

        let started: Value = http
            .post(format!("{}/api/adventure/start", base))
            .json(&json!({ "genre": "Fantasy" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(started["phase"], "playing");
        assert_eq!(started["currentScene"]["text"], "A lantern flickers.");
        assert_eq!(started["entries"][0]["type"], "scene");

        let failed: Value = http
            .post(format!("{}/api/adventure/action", base))
            .json(&json!({ "action": "pick up the lantern" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(failed["phase"], "playing");
        assert_eq!(failed["error"], "The story could not continue. An unexpected error occurred.");
        assert_eq!(failed["entries"][1]["type"], "action");

        let menu: Value = http
            .delete(format!("{}/api/adventure", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(menu["phase"], "menu");
        assert_eq!(menu["entries"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_action_without_game_is_conflict() {
        let (base, _state) = spawn_app(Arc::new(FakeClient::new())).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/adventure/action", base))
            .json(&json!({ "action": "look around" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 409);
    }
}
