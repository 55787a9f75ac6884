// src/handlers/status.rs
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /api/status - Liveness and version
pub async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let uptime = Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at,
        "uptime_seconds": uptime.num_seconds(),
        "endpoints": {
            "status": "/api/status",
            "video": "/api/video",
            "images": "/api/images",
            "adventure": "/api/adventure"
        }
    }))
}

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::spawn_app;
    use crate::jobs::video_job::test_support::FakeClient;
    use serde_json::Value;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_reports_version() {
        let (base, _state) = spawn_app(Arc::new(FakeClient::new())).await;

        let body: Value = reqwest::get(format!("{}/api/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "operational");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
