// src/narration.rs
//! Narration playback: a start/stop toggle over an injected speech synthesizer.

use crate::error::{PlaybackError, PlaybackErrorReason};
use crate::generation::NarrationScript;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub language_code: String,
}

impl From<&NarrationScript> for Utterance {
    fn from(script: &NarrationScript) -> Self {
        Self {
            text: script.script.clone(),
            language_code: script.language_code.clone(),
        }
    }
}

/// Lifecycle notifications for one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
    Error(PlaybackErrorReason),
}

/// Speech output capability. `speak` returns the event stream of the new
/// utterance; `cancel` stops whatever is currently being spoken.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<SpeechEvent>;
    fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Started,
    Finished,
    /// The utterance was canceled. Not an error.
    Stopped,
}

struct ActiveUtterance {
    language_code: String,
    events: mpsc::UnboundedReceiver<SpeechEvent>,
}

pub struct NarrationPlayer {
    synth: Arc<dyn SpeechSynthesizer>,
    active: Option<ActiveUtterance>,
}

impl NarrationPlayer {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synth, active: None }
    }

    pub fn state(&self) -> PlaybackState {
        if self.active.is_some() {
            PlaybackState::Speaking
        } else {
            PlaybackState::Idle
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.state() == PlaybackState::Speaking
    }

    /// Start speaking `script`. Callers stop any current utterance first.
    pub fn play(&mut self, script: &NarrationScript) {
        if self.active.is_some() {
            tracing::warn!("Narration already playing, ignoring play request");
            return;
        }
        tracing::info!("🔊 Playing narration ({})", script.language_code);
        let events = self.synth.speak(Utterance::from(script));
        self.active = Some(ActiveUtterance {
            language_code: script.language_code.clone(),
            events,
        });
    }

    /// Stop playback. Safe to call when idle.
    pub fn stop(&mut self) {
        if self.active.take().is_some() {
            tracing::info!("🔇 Narration stopped");
            self.synth.cancel();
        }
    }

    /// Speaking → stop; idle → play `script` if there is one.
    pub fn toggle(&mut self, script: Option<&NarrationScript>) -> PlaybackState {
        match (self.state(), script) {
            (PlaybackState::Speaking, _) => self.stop(),
            (PlaybackState::Idle, Some(script)) => self.play(script),
            (PlaybackState::Idle, None) => {
                tracing::debug!("No narration script available, nothing to play");
            }
        }
        self.state()
    }

    /// Wait for the next playback event. Never resolves while idle.
    pub async fn next_event(&mut self) -> Result<PlaybackOutcome, PlaybackError> {
        let Some(active) = self.active.as_mut() else {
            return std::future::pending().await;
        };

        let event = active.events.recv().await;
        let language_code = active.language_code.clone();
        match event {
            Some(SpeechEvent::Started) => Ok(PlaybackOutcome::Started),
            Some(SpeechEvent::Ended) => {
                self.active = None;
                Ok(PlaybackOutcome::Finished)
            }
            Some(SpeechEvent::Error(PlaybackErrorReason::Canceled)) => {
                self.active = None;
                Ok(PlaybackOutcome::Stopped)
            }
            Some(SpeechEvent::Error(reason)) => {
                self.active = None;
                let error = PlaybackError::new(reason, &language_code);
                tracing::warn!("Narration playback failed ({:?}): {}", reason, error);
                Err(error)
            }
            None => {
                self.active = None;
                Err(PlaybackError::new(PlaybackErrorReason::Unknown, &language_code))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records utterances and hands the test the sender of each one.
    #[derive(Default)]
    pub struct FakeSynth {
        pub spoken: Mutex<Vec<Utterance>>,
        pub senders: Mutex<Vec<mpsc::UnboundedSender<SpeechEvent>>>,
        pub cancels: Mutex<usize>,
    }

    impl FakeSynth {
        pub fn emit(&self, event: SpeechEvent) {
            if let Some(tx) = self.senders.lock().unwrap().last() {
                let _ = tx.send(event);
            }
        }

        pub fn cancel_count(&self) -> usize {
            *self.cancels.lock().unwrap()
        }
    }

    impl SpeechSynthesizer for FakeSynth {
        fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<SpeechEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(SpeechEvent::Started);
            self.spoken.lock().unwrap().push(utterance);
            self.senders.lock().unwrap().push(tx);
            rx
        }

        fn cancel(&self) {
            *self.cancels.lock().unwrap() += 1;
            if let Some(tx) = self.senders.lock().unwrap().last() {
                let _ = tx.send(SpeechEvent::Error(PlaybackErrorReason::Canceled));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeSynth;
    use super::*;
    use std::time::Duration;

    fn script(language_code: &str) -> NarrationScript {
        NarrationScript {
            script: "Ein Hologramm".to_string(),
            language_code: language_code.to_string(),
        }
    }

    #[tokio::test]
    async fn test_play_until_finished() {
        let synth = Arc::new(FakeSynth::default());
        let mut player = NarrationPlayer::new(synth.clone());

        player.play(&script("de-DE"));
        assert_eq!(player.state(), PlaybackState::Speaking);
        assert_eq!(player.next_event().await, Ok(PlaybackOutcome::Started));

        synth.emit(SpeechEvent::Ended);
        assert_eq!(player.next_event().await, Ok(PlaybackOutcome::Finished));
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(synth.spoken.lock().unwrap()[0].language_code, "de-DE");
    }

    #[tokio::test]
    async fn test_errors_map_to_reasons() {
        let synth = Arc::new(FakeSynth::default());
        let mut player = NarrationPlayer::new(synth.clone());

        player.play(&script("fa-IR"));
        player.next_event().await.unwrap();
        synth.emit(SpeechEvent::Error(PlaybackErrorReason::LanguageUnavailable));

        let err = player.next_event().await.unwrap_err();
        assert_eq!(err.reason, PlaybackErrorReason::LanguageUnavailable);
        assert!(err.message.contains("fa-IR"));
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_cancellation_is_swallowed() {
        let synth = Arc::new(FakeSynth::default());
        let mut player = NarrationPlayer::new(synth.clone());

        player.play(&script("en-US"));
        player.next_event().await.unwrap();
        // Canceled from outside the player, e.g. the engine was reset.
        synth.emit(SpeechEvent::Error(PlaybackErrorReason::Canceled));

        assert_eq!(player.next_event().await, Ok(PlaybackOutcome::Stopped));
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_toggle_and_idempotent_stop() {
        let synth = Arc::new(FakeSynth::default());
        let mut player = NarrationPlayer::new(synth.clone());

        player.stop();
        assert_eq!(synth.cancel_count(), 0);

        assert_eq!(player.toggle(None), PlaybackState::Idle);
        assert_eq!(player.toggle(Some(&script("en-US"))), PlaybackState::Speaking);
        assert_eq!(player.toggle(Some(&script("en-US"))), PlaybackState::Idle);
        assert_eq!(synth.cancel_count(), 1);

        player.stop();
        assert_eq!(synth.cancel_count(), 1);

        // Idle players never produce events.
        let idle = tokio::time::timeout(Duration::from_millis(20), player.next_event()).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn test_play_while_speaking_is_ignored() {
        let synth = Arc::new(FakeSynth::default());
        let mut player = NarrationPlayer::new(synth.clone());

        player.play(&script("en-US"));
        player.play(&script("hi-IN"));
        assert_eq!(synth.spoken.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_unknown_error() {
        let synth = Arc::new(FakeSynth::default());
        let mut player = NarrationPlayer::new(synth.clone());

        player.play(&script("en-US"));
        player.next_event().await.unwrap();
        synth.senders.lock().unwrap().clear();

        let err = player.next_event().await.unwrap_err();
        assert_eq!(err.reason, PlaybackErrorReason::Unknown);
    }
}
