// src/jobs/mod.rs
//! Video generation job tracking: the state owned by one video screen session,
//! the tagged events that drive it, and the snapshot handed to the HTTP layer.

use crate::error::{PlaybackError, StudioError, StudioResult};
use crate::generation::{GenerationJob, NarrationDraft, NarrationScript};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

pub mod poll_timer;
pub mod screen;
pub mod video_job;

pub const VIDEO_FILE_NAME: &str = "gemini-video.mp4";
pub const VIDEO_MIME_TYPE: &str = "video/mp4";
pub const NARRATION_FAILED_NOTICE: &str = "Video generated, but failed to create narration.";

/// Rotated on screen while a job is being submitted or polled.
pub const PROGRESS_MESSAGES: [&str; 6] = [
    "Warming up the digital director...",
    "Rendering the first few frames...",
    "Consulting with the AI muse...",
    "Splicing cinematic sequences...",
    "This can take a few minutes, thank you for your patience!",
    "Adding a touch of digital magic...",
];

/// Generation tag identifying one submission. Events carrying any other tag
/// than the controller's current one are stale and get discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobTag(u64);

impl JobTag {
    pub fn first() -> Self {
        JobTag(1)
    }

    pub fn next(self) -> Self {
        JobTag(self.0 + 1)
    }
}

impl fmt::Display for JobTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Local handle to a downloaded video. Stops resolving once the asset is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AssetHandle(Uuid);

impl AssetHandle {
    pub fn new() -> Self {
        AssetHandle(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(AssetHandle)
    }
}

impl Default for AssetHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A rendered video held in memory for the lifetime of one result.
#[derive(Debug, Clone)]
pub struct VideoAsset {
    pub handle: AssetHandle,
    pub source_uri: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<Vec<u8>>,
}

impl VideoAsset {
    pub fn new(source_uri: String, bytes: Vec<u8>) -> Self {
        Self {
            handle: AssetHandle::new(),
            source_uri,
            file_name: VIDEO_FILE_NAME.to_string(),
            mime_type: VIDEO_MIME_TYPE.to_string(),
            bytes: Arc::new(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationStatus {
    Pending,
    Ready(NarrationScript),
    Unavailable,
}

#[derive(Debug, Clone)]
pub enum WorkflowState {
    Idle,
    Submitting,
    /// Waiting on the remote job, or on the download of its finished video.
    Polling,
    Completed {
        asset: VideoAsset,
        narration: NarrationStatus,
    },
    Failed(StudioError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn phase(&self) -> WorkflowPhase {
        match self {
            WorkflowState::Idle => WorkflowPhase::Idle,
            WorkflowState::Submitting => WorkflowPhase::Submitting,
            WorkflowState::Polling => WorkflowPhase::Polling,
            WorkflowState::Completed { .. } => WorkflowPhase::Completed,
            WorkflowState::Failed(_) => WorkflowPhase::Failed,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, WorkflowState::Submitting | WorkflowState::Polling)
    }

    pub fn asset(&self) -> Option<&VideoAsset> {
        match self {
            WorkflowState::Completed { asset, .. } => Some(asset),
            _ => None,
        }
    }

    pub fn narration(&self) -> Option<&NarrationScript> {
        match self {
            WorkflowState::Completed {
                narration: NarrationStatus::Ready(script),
                ..
            } => Some(script),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&StudioError> {
        match self {
            WorkflowState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Results of remote calls and timer ticks, each stamped with the job it belongs to.
#[derive(Debug)]
pub enum WorkflowEvent {
    Tick(JobTag),
    Submitted {
        tag: JobTag,
        result: StudioResult<GenerationJob>,
    },
    Polled {
        tag: JobTag,
        result: StudioResult<GenerationJob>,
    },
    AssetFetched {
        tag: JobTag,
        source_uri: String,
        result: StudioResult<Vec<u8>>,
    },
    NarrationGenerated {
        tag: JobTag,
        result: StudioResult<NarrationDraft>,
    },
}

impl WorkflowEvent {
    pub fn tag(&self) -> JobTag {
        match self {
            WorkflowEvent::Tick(tag) => *tag,
            WorkflowEvent::Submitted { tag, .. }
            | WorkflowEvent::Polled { tag, .. }
            | WorkflowEvent::AssetFetched { tag, .. }
            | WorkflowEvent::NarrationGenerated { tag, .. } => *tag,
        }
    }
}

/// Cosmetic progress text; no protocol meaning.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTicker {
    started_at: Instant,
    cadence: Duration,
}

impl ProgressTicker {
    pub fn start(cadence: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            cadence,
        }
    }

    pub fn message_at(&self, now: Instant) -> &'static str {
        let cadence_ms = self.cadence.as_millis().max(1);
        let elapsed_ms = now.saturating_duration_since(self.started_at).as_millis();
        let index = (elapsed_ms / cadence_ms) as usize % PROGRESS_MESSAGES.len();
        PROGRESS_MESSAGES[index]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetSummary {
    pub handle: AssetHandle,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub download_url: String,
}

impl From<&VideoAsset> for AssetSummary {
    fn from(asset: &VideoAsset) -> Self {
        Self {
            handle: asset.handle,
            file_name: asset.file_name.clone(),
            mime_type: asset.mime_type.clone(),
            size_bytes: asset.bytes.len(),
            download_url: format!("/api/video/assets/{}", asset.handle),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub kind: &'static str,
    pub message: String,
}

impl From<&StudioError> for ErrorSummary {
    fn from(error: &StudioError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Everything a video screen renders.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    pub job_tag: Option<JobTag>,
    pub prompt: Option<String>,
    pub progress_message: Option<&'static str>,
    pub polls: u32,
    pub error: Option<ErrorSummary>,
    pub notice: Option<String>,
    pub asset: Option<AssetSummary>,
    pub narration: Option<NarrationScript>,
    pub narration_pending: bool,
    pub narrating: bool,
    pub playback_error: Option<PlaybackError>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_messages_rotate_on_cadence() {
        let ticker = ProgressTicker::start(Duration::from_secs(4));
        let t0 = ticker.started_at;

        assert_eq!(ticker.message_at(t0), PROGRESS_MESSAGES[0]);
        assert_eq!(ticker.message_at(t0 + Duration::from_millis(3999)), PROGRESS_MESSAGES[0]);
        assert_eq!(ticker.message_at(t0 + Duration::from_secs(4)), PROGRESS_MESSAGES[1]);
        assert_eq!(ticker.message_at(t0 + Duration::from_secs(24)), PROGRESS_MESSAGES[0]);
    }

    #[test]
    fn test_tags_are_monotonic() {
        let a = JobTag::first();
        let b = a.next();
        assert!(b > a);
        assert_ne!(a, b);
        assert_eq!(b.to_string(), "job#2");
    }

    #[test]
    fn test_asset_handle_round_trips_through_text() {
        let handle = AssetHandle::new();
        assert_eq!(AssetHandle::parse(&handle.to_string()), Some(handle));
        assert_eq!(AssetHandle::parse("not-a-handle"), None);
    }
}
