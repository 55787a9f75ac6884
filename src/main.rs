use gemini_studio::{
    gemini_client::GeminiClient,
    handlers,
    speech::{ClipStore, GeminiSpeech},
    AppState, StudioConfig,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    // A missing credential is fatal; the server never binds without one
    let config = match StudioConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Configuration - Gemini base URL: {}, poll interval: {:?}, progress cadence: {:?}",
        config.base_url,
        config.workflow.poll_interval,
        config.workflow.progress_cadence
    );

    let gemini_client = Arc::new(GeminiClient::from_config(&config));
    let narration_clips = ClipStore::default();
    let mut speech = GeminiSpeech::new(gemini_client.clone(), narration_clips.clone());
    if let Some(voice) = &config.tts_voice {
        tracing::info!("🎙️ Narration voice: {}", voice);
        speech = speech.with_voice(voice.clone());
    }
    let speech = Arc::new(speech);

    let shared_state = Arc::new(AppState::new(
        gemini_client,
        speech,
        narration_clips,
        config.workflow,
    ));

    let app = handlers::api_router(shared_state).layer(CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("❌ Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("listening on {}", config.bind_addr);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("❌ Server error: {}", e);
    }
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,gemini_studio=trace,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,gemini_studio=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();

    tracing::info!("🎬 Gemini Studio starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
