// lib.rs - Gemini Studio: adventure, still images and narrated video generation
pub mod adventure;
pub mod config;
pub mod error;
pub mod gemini_client;
pub mod generation;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod narration;
pub mod speech;

use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use config::{StudioConfig, WorkflowConfig};
pub use error::{ConfigError, PlaybackError, PlaybackErrorReason, StudioError, StudioResult};
pub use generation::GenerationClient;

// AppState holds the generation client plus the state of each screen
pub struct AppState {
    pub generation_client: Arc<dyn GenerationClient>,
    pub video_screen: jobs::screen::VideoScreenHandle, // 🎬 One video screen session
    pub narration_clips: speech::ClipStore,            // 🔊 Last rendered narration audio
    pub adventure: adventure::Adventure,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Spawns the video screen task, so this must run inside a tokio runtime.
    pub fn new(
        generation_client: Arc<dyn GenerationClient>,
        synth: Arc<dyn narration::SpeechSynthesizer>,
        narration_clips: speech::ClipStore,
        workflow: WorkflowConfig,
    ) -> Self {
        let video_screen = jobs::screen::VideoScreenHandle::spawn(
            generation_client.clone(),
            synth,
            narration_clips.clone(),
            workflow,
        );
        Self {
            adventure: adventure::Adventure::new(generation_client.clone()),
            generation_client,
            video_screen,
            narration_clips,
            started_at: Utc::now(),
        }
    }
}
