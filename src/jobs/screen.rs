// src/jobs/screen.rs
//! Video screen actor: one task owning one workflow controller and one
//! narration player, driven by commands from the HTTP layer.

use super::video_job::VideoWorkflowController;
use super::{AssetHandle, VideoAsset, WorkflowEvent, WorkflowSnapshot};
use crate::config::WorkflowConfig;
use crate::error::{PlaybackError, StudioError, StudioResult};
use crate::generation::GenerationClient;
use crate::narration::{NarrationPlayer, PlaybackOutcome, SpeechSynthesizer};
use crate::speech::ClipStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
pub enum ScreenCommand {
    Submit {
        prompt: String,
        reply: oneshot::Sender<StudioResult<WorkflowSnapshot>>,
    },
    ToggleNarration {
        reply: oneshot::Sender<WorkflowSnapshot>,
    },
    Snapshot {
        reply: oneshot::Sender<WorkflowSnapshot>,
    },
    Asset {
        handle: AssetHandle,
        reply: oneshot::Sender<Option<VideoAsset>>,
    },
    Leave {
        reply: oneshot::Sender<WorkflowSnapshot>,
    },
}

/// Cloneable handle to a running screen task.
#[derive(Debug, Clone)]
pub struct VideoScreenHandle {
    commands: mpsc::Sender<ScreenCommand>,
}

impl VideoScreenHandle {
    pub fn spawn(
        client: Arc<dyn GenerationClient>,
        synth: Arc<dyn SpeechSynthesizer>,
        clips: ClipStore,
        config: WorkflowConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let screen = VideoScreen {
            controller: VideoWorkflowController::new(client, config),
            player: NarrationPlayer::new(synth),
            clips,
            playback_error: None,
        };
        tokio::spawn(screen.run(rx));
        Self { commands: tx }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ScreenCommand) -> StudioResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| StudioError::GenerationError("video screen is not running".to_string()))?;
        rx.await
            .map_err(|_| StudioError::GenerationError("video screen dropped the request".to_string()))
    }

    pub async fn submit(&self, prompt: impl Into<String>) -> StudioResult<WorkflowSnapshot> {
        let prompt = prompt.into();
        self.request(|reply| ScreenCommand::Submit { prompt, reply }).await?
    }

    pub async fn toggle_narration(&self) -> StudioResult<WorkflowSnapshot> {
        self.request(|reply| ScreenCommand::ToggleNarration { reply }).await
    }

    pub async fn snapshot(&self) -> StudioResult<WorkflowSnapshot> {
        self.request(|reply| ScreenCommand::Snapshot { reply }).await
    }

    pub async fn asset(&self, handle: AssetHandle) -> StudioResult<Option<VideoAsset>> {
        self.request(|reply| ScreenCommand::Asset { handle, reply }).await
    }

    pub async fn leave(&self) -> StudioResult<WorkflowSnapshot> {
        self.request(|reply| ScreenCommand::Leave { reply }).await
    }
}

struct VideoScreen {
    controller: VideoWorkflowController,
    player: NarrationPlayer,
    /// Rendered narration audio; belongs to the current video only.
    clips: ClipStore,
    playback_error: Option<PlaybackError>,
}

enum Step {
    Command(ScreenCommand),
    Workflow(WorkflowEvent),
    Playback(Result<PlaybackOutcome, PlaybackError>),
    Shutdown,
}

impl VideoScreen {
    async fn run(mut self, mut commands: mpsc::Receiver<ScreenCommand>) {
        tracing::info!("🎥 Video screen started");
        loop {
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Shutdown,
                },
                Some(event) = self.controller.next_event() => Step::Workflow(event),
                outcome = self.player.next_event() => Step::Playback(outcome),
            };

            match step {
                Step::Command(command) => self.handle_command(command),
                Step::Workflow(event) => self.controller.handle_event(event),
                Step::Playback(Ok(outcome)) => {
                    tracing::debug!("Narration playback: {:?}", outcome);
                }
                Step::Playback(Err(error)) => self.playback_error = Some(error),
                Step::Shutdown => break,
            }
        }
        self.player.stop();
        self.controller.leave();
        tracing::info!("🎥 Video screen stopped");
    }

    fn handle_command(&mut self, command: ScreenCommand) {
        match command {
            ScreenCommand::Submit { prompt, reply } => {
                let result = self.submit(&prompt);
                let _ = reply.send(result);
            }
            ScreenCommand::ToggleNarration { reply } => {
                self.playback_error = None;
                let script = self.controller.state().narration().cloned();
                let state = self.player.toggle(script.as_ref());
                tracing::info!("🎙️ Narration toggled, now {:?}", state);
                let _ = reply.send(self.snapshot());
            }
            ScreenCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            ScreenCommand::Asset { handle, reply } => {
                let _ = reply.send(self.controller.asset(handle));
            }
            ScreenCommand::Leave { reply } => {
                self.player.stop();
                self.playback_error = None;
                self.controller.leave();
                self.clips.clear();
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn submit(&mut self, prompt: &str) -> StudioResult<WorkflowSnapshot> {
        if prompt.trim().is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        self.player.stop();
        self.playback_error = None;
        self.controller.submit(prompt)?;
        self.clips.clear();
        Ok(self.snapshot())
    }

    fn snapshot(&self) -> WorkflowSnapshot {
        let mut snapshot = self.controller.snapshot();
        snapshot.narrating = self.player.is_speaking();
        snapshot.playback_error = self.playback_error.clone();
        snapshot
    }
}
