// src/generation.rs
//! The generation client seam: domain values exchanged with the provider and the
//! trait every screen talks to. `GeminiClient` is the production implementation.

use crate::error::{StudioError, StudioResult};
use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};

/// Largest batch the still-image screen may request.
pub const MAX_IMAGES_PER_REQUEST: usize = 4;

pub const DEFAULT_NARRATION_SCRIPT: &str = "Here is your video.";
pub const DEFAULT_NARRATION_LANGUAGE: &str = "en-US";

/// Provider handle for a long-running video generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Operation name used to check the job's status.
    pub name: String,
    pub done: bool,
    pub result_uri: Option<String>,
}

impl GenerationJob {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            result_uri: None,
        }
    }

    pub fn finished(name: impl Into<String>, result_uri: Option<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            result_uri,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            bytes,
        }
    }

    /// Inline `data:` URL suitable for direct rendering.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64_STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationScript {
    pub script: String,
    /// BCP-47 tag, e.g. `en-US` or `hi-IN`.
    pub language_code: String,
}

impl NarrationScript {
    pub fn fallback() -> Self {
        Self {
            script: DEFAULT_NARRATION_SCRIPT.to_string(),
            language_code: DEFAULT_NARRATION_LANGUAGE.to_string(),
        }
    }
}

/// Outcome of asking the model for a narration script.
///
/// Narration is cosmetic, so an unparseable answer degrades to the default
/// script instead of failing the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationDraft {
    Parsed(NarrationScript),
    Defaulted,
}

impl NarrationDraft {
    pub fn from_model_text(text: &str) -> Self {
        match serde_json::from_str::<NarrationScript>(strip_code_fence(text)) {
            Ok(script) if !script.script.trim().is_empty() && !script.language_code.trim().is_empty() => {
                NarrationDraft::Parsed(script)
            }
            Ok(_) => {
                tracing::warn!("Narration script JSON had empty fields, using default narration");
                NarrationDraft::Defaulted
            }
            Err(e) => {
                tracing::warn!("Failed to parse narration script JSON ({}): {}", e, text);
                NarrationDraft::Defaulted
            }
        }
    }

    pub fn into_script(self) -> NarrationScript {
        match self {
            NarrationDraft::Parsed(script) => script,
            NarrationDraft::Defaulted => NarrationScript::fallback(),
        }
    }
}

/// Structured answer of the storyteller model for one adventure turn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDraft {
    pub scene_description: String,
    pub image_prompt: String,
}

impl SceneDraft {
    pub fn from_model_text(text: &str) -> StudioResult<Self> {
        let draft: SceneDraft = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
            tracing::error!("Failed to parse storyteller JSON response: {}", text);
            StudioError::InvalidStoryResponse(e.to_string())
        })?;

        if draft.scene_description.trim().is_empty() || draft.image_prompt.trim().is_empty() {
            return Err(StudioError::InvalidStoryResponse(
                "sceneDescription and imagePrompt must not be empty".to_string(),
            ));
        }
        Ok(draft)
    }
}

/// Scene text plus the picture rendered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneResult {
    pub scene_text: String,
    pub image_prompt: String,
    pub image_url: String,
}

/// Remote operations the screens depend on. Implementations never retry and never cache.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Start a long-running video job.
    async fn submit_video_job(&self, prompt: &str) -> StudioResult<GenerationJob>;

    /// Read the current status of a job. Has no side effects beyond the remote read.
    async fn poll_video_job(&self, job: &GenerationJob) -> StudioResult<GenerationJob>;

    /// Download the rendered video referenced by a finished job.
    async fn fetch_video(&self, result_uri: &str) -> StudioResult<Vec<u8>>;

    async fn generate_still_images(&self, prompt: &str, count: usize) -> StudioResult<Vec<ImageBlob>>;

    /// Ask for a narration script. Only transport failures are errors; an
    /// unparseable answer comes back as [`NarrationDraft::Defaulted`].
    async fn generate_narration_script(&self, prompt: &str) -> StudioResult<NarrationDraft>;

    /// Generate the next scene's text, then an image for it.
    async fn generate_scene_and_image(&self, context_prompt: &str) -> StudioResult<SceneResult>;
}

pub fn validate_image_count(count: usize) -> StudioResult<()> {
    if (1..=MAX_IMAGES_PER_REQUEST).contains(&count) {
        Ok(())
    } else {
        Err(StudioError::GenerationError(format!(
            "image count must be between 1 and {}, got {}",
            MAX_IMAGES_PER_REQUEST, count
        )))
    }
}

pub fn narration_prompt(prompt: &str) -> String {
    format!(
        "Analyze the following user prompt for a video generation task. Your instructions are:\n\
         1. Identify the primary language of the prompt.\n\
         2. Determine the appropriate BCP-47 language code for that language (e.g., 'en-US', 'hi-IN', 'ur-PK', 'fa-IR').\n\
         3. Write a short, engaging narration script that describes the scene from the prompt. The script MUST be in the same language as the original prompt.\n\
         4. Return a single JSON object containing the language code and the script.\n\n\
         User Prompt: \"{}\"",
        prompt
    )
}

// Models occasionally wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
