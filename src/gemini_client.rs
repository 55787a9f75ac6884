// src/gemini_client.rs
//! REST client for the Gemini API family: structured text, Imagen stills,
//! Veo long-running video jobs and TTS audio.

use crate::config::StudioConfig;
use crate::error::{StudioError, StudioResult};
use crate::generation::{
    narration_prompt, validate_image_count, GenerationClient, GenerationJob, ImageBlob,
    NarrationDraft, SceneDraft, SceneResult,
};
use async_trait::async_trait;
use base64::prelude::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const TEXT_MODEL: &str = "gemini-2.5-flash";
pub const IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const VIDEO_MODEL: &str = "veo-2.0-generate-001";
pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Zephyr";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Low-level failure of a single API call, before it is classified into the
/// taxonomy of the operation that issued it.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Gemini API error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// API REQUEST/RESPONSE STRUCTURES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String, // base64 encoded data
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(rename = "responseModalities", skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(rename = "speechConfig", skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason")]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    pub fn inline_data(&self) -> Option<&InlineData> {
        let content = self.candidates.first()?.content.as_ref()?;
        content.parts.iter().find_map(|part| match part {
            Part::InlineData { inline_data } => Some(inline_data),
            _ => None,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<ImagePrediction>,
}

#[derive(Debug, Deserialize)]
pub struct ImagePrediction {
    #[serde(rename = "bytesBase64Encoded")]
    pub bytes_base64_encoded: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// Long-running operation as returned by `predictLongRunning` and `operations.get`.
#[derive(Debug, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub response: Option<OperationResponse>,
    pub error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
pub struct OperationResponse {
    #[serde(rename = "generateVideoResponse")]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateVideoResponse {
    #[serde(rename = "generatedSamples", default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedSample {
    pub video: Option<VideoFile>,
}

#[derive(Debug, Deserialize)]
pub struct VideoFile {
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    pub code: Option<i32>,
    pub message: Option<String>,
}

impl Operation {
    fn into_job(self) -> GenerationJob {
        if let Some(error) = &self.error {
            tracing::warn!(
                "Video operation {} finished with error {:?}: {}",
                self.name,
                error.code,
                error.message.as_deref().unwrap_or("unknown")
            );
        }
        let result_uri = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri);
        GenerationJob {
            name: self.name,
            done: self.done,
            result_uri,
        }
    }
}

pub fn scene_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "sceneDescription": {
                "type": "STRING",
                "description": "A compelling description of what happens next as a result of the player's action. Describe the environment, events, and any characters. The tone should match the genre. Do not break the fourth wall. Keep the story moving forward. End with a prompt for the player, asking what they do next."
            },
            "imagePrompt": {
                "type": "STRING",
                "description": "A detailed, descriptive prompt for an AI image generator to create a visual representation of the scene. This prompt should be in English and focus on visual details, style, and atmosphere."
            }
        },
        "required": ["sceneDescription", "imagePrompt"]
    })
}

pub fn narration_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "script": {
                "type": "STRING",
                "description": "A short, descriptive narration script for a video, based on the user's prompt. The script should be in the same language as the user's prompt."
            },
            "languageCode": {
                "type": "STRING",
                "description": "The BCP-47 language code for the script (e.g., 'en-US', 'hi-IN', 'ur-PK', 'fa-IR')."
            }
        },
        "required": ["script", "languageCode"]
    })
}

// ============================================================================
// IMPLEMENTATION
// ============================================================================

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StudioConfig) -> Self {
        Self::new(config.api_key.clone(), config.base_url.clone())
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(&self, url: &str, body: &Value) -> Result<T, ApiError> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status { status, body });
        }

        let response_text = response.text().await?;
        tracing::debug!("Gemini API response (truncated): {}...", truncate(&response_text, 500));
        serde_json::from_str(&response_text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Text generation constrained to a JSON schema. Returns the raw JSON text.
    pub async fn generate_structured(
        &self,
        prompt: &str,
        schema: Value,
        temperature: Option<f32>,
        top_p: Option<f32>,
    ) -> Result<String, ApiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::Text { text: prompt.to_string() }],
                role: Some("user".to_string()),
            }],
            generation_config: Some(GenerationConfig {
                temperature,
                top_p,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema),
                ..Default::default()
            }),
        };
        let body = serde_json::to_value(&request).map_err(|e| ApiError::Decode(e.to_string()))?;

        let response: GenerateContentResponse = self
            .post_json(&self.model_url(TEXT_MODEL, "generateContent"), &body)
            .await?;

        if let Some(reason) = response.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_ref()) {
            return Err(ApiError::Decode(format!("prompt blocked: {}", reason)));
        }

        response
            .text()
            .ok_or_else(|| ApiError::Decode("no text in response".to_string()))
    }

    /// Generate `count` images with Imagen.
    pub async fn generate_images(
        &self,
        prompt: &str,
        count: usize,
        aspect_ratio: &str,
    ) -> Result<Vec<ImageBlob>, ApiError> {
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": count,
                "aspectRatio": aspect_ratio,
                "outputOptions": { "mimeType": "image/jpeg" }
            }
        });

        tracing::info!("🖼️ Generating {} image(s) at {}", count, aspect_ratio);
        let response: PredictResponse = self.post_json(&self.model_url(IMAGE_MODEL, "predict"), &body).await?;

        response
            .predictions
            .into_iter()
            .filter_map(|p| p.bytes_base64_encoded.map(|data| (data, p.mime_type)))
            .map(|(data, mime_type)| {
                let bytes = BASE64_STANDARD
                    .decode(data)
                    .map_err(|e| ApiError::Decode(format!("Failed to decode base64 image: {}", e)))?;
                Ok(ImageBlob {
                    mime_type: mime_type.unwrap_or_else(|| "image/jpeg".to_string()),
                    bytes,
                })
            })
            .collect()
    }

    pub async fn start_video_operation(&self, prompt: &str) -> Result<Operation, ApiError> {
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 }
        });
        self.post_json(&self.model_url(VIDEO_MODEL, "predictLongRunning"), &body).await
    }

    pub async fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        let url = format!("{}/{}", self.base_url, name.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status { status, body });
        }

        response.json().await.map_err(ApiError::from)
    }

    /// Authenticated download of a generated file.
    pub async fn download(&self, uri: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(uri)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status { status, body });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Generate speech audio (raw PCM) from text using the Gemini TTS model.
    pub async fn generate_speech(&self, text: &str, language_code: &str, voice: Option<&str>) -> Result<Vec<u8>, ApiError> {
        let voice = voice.unwrap_or(DEFAULT_VOICE);
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::Text { text: text.to_string() }],
                role: Some("user".to_string()),
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(json!({
                    "languageCode": language_code,
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
                })),
                ..Default::default()
            }),
        };
        let body = serde_json::to_value(&request).map_err(|e| ApiError::Decode(e.to_string()))?;

        tracing::info!("🎵 Generating speech audio for text: '{}' with voice: {}", truncate(text, 100), voice);

        let response: GenerateContentResponse = self
            .post_json(&self.model_url(SPEECH_MODEL, "generateContent"), &body)
            .await?;

        let inline = response
            .inline_data()
            .ok_or_else(|| ApiError::Decode("No audio data found in TTS response".to_string()))?;
        let audio = BASE64_STANDARD
            .decode(&inline.data)
            .map_err(|e| ApiError::Decode(format!("Failed to decode audio data: {}", e)))?;

        tracing::info!("✅ Generated {} bytes of audio data", audio.len());
        Ok(audio)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn submit_video_job(&self, prompt: &str) -> StudioResult<GenerationJob> {
        tracing::info!("🎬 Submitting video job for prompt: '{}'", truncate(prompt, 100));
        let operation = self
            .start_video_operation(prompt)
            .await
            .map_err(|e| StudioError::SubmissionError(e.to_string()))?;

        if let Some(error) = &operation.error {
            return Err(StudioError::SubmissionError(
                error.message.clone().unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        if operation.name.is_empty() {
            return Err(StudioError::SubmissionError("operation has no name".to_string()));
        }
        Ok(operation.into_job())
    }

    async fn poll_video_job(&self, job: &GenerationJob) -> StudioResult<GenerationJob> {
        let operation = self
            .get_operation(&job.name)
            .await
            .map_err(|e| StudioError::PollError(e.to_string()))?;
        Ok(operation.into_job())
    }

    async fn fetch_video(&self, result_uri: &str) -> StudioResult<Vec<u8>> {
        self.download(result_uri)
            .await
            .map_err(|e| StudioError::AssetFetchError(e.to_string()))
    }

    async fn generate_still_images(&self, prompt: &str, count: usize) -> StudioResult<Vec<ImageBlob>> {
        validate_image_count(count)?;
        let images = self
            .generate_images(prompt, count, "1:1")
            .await
            .map_err(|e| StudioError::GenerationError(e.to_string()))?;

        if images.len() != count {
            return Err(StudioError::GenerationError(format!(
                "requested {} images but received {}",
                count,
                images.len()
            )));
        }
        Ok(images)
    }

    async fn generate_narration_script(&self, prompt: &str) -> StudioResult<NarrationDraft> {
        match self
            .generate_structured(&narration_prompt(prompt), narration_schema(), None, None)
            .await
        {
            Ok(text) => Ok(NarrationDraft::from_model_text(&text)),
            // A 200 with an unusable body is still a parse failure, not a transport one.
            Err(ApiError::Decode(e)) => {
                tracing::warn!("Narration response unusable ({}), using default narration", e);
                Ok(NarrationDraft::Defaulted)
            }
            Err(e) => Err(StudioError::GenerationError(e.to_string())),
        }
    }

    async fn generate_scene_and_image(&self, context_prompt: &str) -> StudioResult<SceneResult> {
        let text = self
            .generate_structured(context_prompt, scene_schema(), Some(0.8), Some(0.9))
            .await
            .map_err(|e| match e {
                ApiError::Decode(msg) => StudioError::InvalidStoryResponse(msg),
                other => StudioError::GenerationError(other.to_string()),
            })?;
        let draft = SceneDraft::from_model_text(&text)?;

        let image = self
            .generate_images(&draft.image_prompt, 1, "16:9")
            .await
            .map_err(|e| StudioError::GenerationError(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| StudioError::GenerationError("no scene image returned".to_string()))?;

        Ok(SceneResult {
            scene_text: draft.scene_description,
            image_prompt: draft.image_prompt,
            image_url: image.data_url(),
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
