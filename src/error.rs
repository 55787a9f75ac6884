// src/error.rs
//! Error taxonomy shared by the generation client, the video workflow and the screens.

use serde::Serialize;
use thiserror::Error;

/// Every failure a screen can surface to the user.
///
/// Variants carry strings rather than source errors so a terminal error can be
/// stored in a workflow snapshot and cloned out to the HTTP layer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum StudioError {
    #[error("Failed to start video generation: {0}")]
    SubmissionError(String),
    #[error("An error occurred while checking video status: {0}")]
    PollError(String),
    #[error("Video generation finished, but no video was returned. The prompt may have been rejected.")]
    NoResultError,
    #[error("The video was generated but could not be downloaded: {0}")]
    AssetFetchError(String),
    #[error("Received an invalid response from the storyteller: {0}")]
    InvalidStoryResponse(String),
    #[error("Failed to generate images: {0}")]
    GenerationError(String),
    #[error("{0}")]
    Playback(#[from] PlaybackError),
    #[error("Please enter a prompt.")]
    EmptyPrompt,
    #[error("{0}")]
    Conflict(String),
}

impl StudioError {
    /// Stable machine-readable kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::SubmissionError(_) => "submission_error",
            StudioError::PollError(_) => "poll_error",
            StudioError::NoResultError => "no_result_error",
            StudioError::AssetFetchError(_) => "asset_fetch_error",
            StudioError::InvalidStoryResponse(_) => "invalid_story_response",
            StudioError::GenerationError(_) => "generation_error",
            StudioError::Playback(_) => "playback_error",
            StudioError::EmptyPrompt => "empty_prompt",
            StudioError::Conflict(_) => "conflict",
        }
    }
}

/// Why a narration utterance stopped with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorReason {
    NotAllowed,
    LanguageUnavailable,
    SynthesisFailed,
    NetworkError,
    /// Produced when playback is stopped on purpose. Never reported to the user.
    Canceled,
    Unknown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct PlaybackError {
    pub reason: PlaybackErrorReason,
    pub message: String,
}

impl PlaybackError {
    pub fn new(reason: PlaybackErrorReason, language_code: &str) -> Self {
        let message = match reason {
            PlaybackErrorReason::NotAllowed => {
                "Narration blocked. Please interact with the page first or check your autoplay settings.".to_string()
            }
            PlaybackErrorReason::LanguageUnavailable => format!(
                "The narration language ({}) is not supported by the speech synthesis engine.",
                language_code
            ),
            PlaybackErrorReason::SynthesisFailed => {
                "The speech synthesis engine failed. Please try again later.".to_string()
            }
            PlaybackErrorReason::NetworkError => {
                "A network error occurred while fetching speech. Please check your connection.".to_string()
            }
            PlaybackErrorReason::Canceled => "Narration was stopped.".to_string(),
            PlaybackErrorReason::Unknown => {
                "Could not play narration. The language may be unsupported or an unknown error occurred.".to_string()
            }
        };
        Self { reason, message }
    }
}

/// Startup configuration failures. A missing credential is fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY (or API_KEY) environment variable not set")]
    MissingCredential,
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

pub type StudioResult<T> = Result<T, StudioError>;
