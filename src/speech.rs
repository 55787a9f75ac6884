// src/speech.rs
//! Gemini TTS backed speech synthesizer.
//!
//! "Speaking" on the server means: render the script to audio, publish the
//! clip for download, then hold the utterance open for the clip's duration.

use crate::error::PlaybackErrorReason;
use crate::gemini_client::{ApiError, GeminiClient};
use crate::narration::{SpeechEvent, SpeechSynthesizer, Utterance};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Gemini TTS returns 24 kHz, 16-bit, mono PCM.
pub const PCM_SAMPLE_RATE: u32 = 24_000;
const PCM_BYTES_PER_SECOND: u64 = PCM_SAMPLE_RATE as u64 * 2;

#[derive(Debug, Clone)]
pub struct NarrationClip {
    pub language_code: String,
    pub audio: Arc<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl NarrationClip {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.audio.len() as u64 * 1000 / PCM_BYTES_PER_SECOND)
    }
}

/// Holds the most recently rendered narration clip.
#[derive(Debug, Clone, Default)]
pub struct ClipStore {
    inner: Arc<Mutex<Option<NarrationClip>>>,
}

impl ClipStore {
    pub fn latest(&self) -> Option<NarrationClip> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn publish(&self, clip: NarrationClip) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(clip);
    }

    pub fn clear(&self) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

pub struct GeminiSpeech {
    client: Arc<GeminiClient>,
    clips: ClipStore,
    voice: Option<String>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl GeminiSpeech {
    pub fn new(client: Arc<GeminiClient>, clips: ClipStore) -> Self {
        Self {
            client,
            clips,
            voice: None,
            current: Mutex::new(None),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

/// Map a TTS failure onto the playback taxonomy.
pub fn classify_speech_error(error: &ApiError) -> PlaybackErrorReason {
    if let ApiError::Transport(_) = error {
        return PlaybackErrorReason::NetworkError;
    }
    match error.status() {
        Some(401 | 403) => PlaybackErrorReason::NotAllowed,
        Some(400) if error.to_string().to_lowercase().contains("language") => {
            PlaybackErrorReason::LanguageUnavailable
        }
        Some(400) => PlaybackErrorReason::SynthesisFailed,
        Some(status) if status >= 500 => PlaybackErrorReason::SynthesisFailed,
        Some(_) => PlaybackErrorReason::Unknown,
        // 200 without usable audio
        None => PlaybackErrorReason::SynthesisFailed,
    }
}

impl SpeechSynthesizer for GeminiSpeech {
    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<SpeechEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let clips = self.clips.clone();
        let voice = self.voice.clone();

        let handle = tokio::spawn(async move {
            let audio = match client
                .generate_speech(&utterance.text, &utterance.language_code, voice.as_deref())
                .await
            {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::error!("❌ Speech synthesis failed: {}", e);
                    let _ = tx.send(SpeechEvent::Error(classify_speech_error(&e)));
                    return;
                }
            };

            let clip = NarrationClip {
                language_code: utterance.language_code,
                audio: Arc::new(audio),
                created_at: Utc::now(),
            };
            let duration = clip.duration();
            clips.publish(clip);

            let _ = tx.send(SpeechEvent::Started);
            tokio::time::sleep(duration).await;
            let _ = tx.send(SpeechEvent::Ended);
        });

        let previous = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        rx
    }

    fn cancel(&self) {
        if let Some(handle) = self.current.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}
