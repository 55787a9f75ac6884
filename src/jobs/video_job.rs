// src/jobs/video_job.rs
//! Video workflow controller: submit → poll → fetch → narrate for a single job.
//!
//! All state transitions happen in [`VideoWorkflowController::handle_event`],
//! called from one task. Remote calls run as spawned futures and report back
//! through the controller's event channel, stamped with the [`JobTag`] of the
//! submission that started them, so a response for an abandoned job can never
//! touch the state of the current one.

use super::poll_timer::PollTimer;
use super::{
    AssetSummary, ErrorSummary, JobTag, NarrationStatus, ProgressTicker, VideoAsset, WorkflowEvent,
    WorkflowPhase, WorkflowSnapshot, WorkflowState, NARRATION_FAILED_NOTICE,
};
use crate::config::WorkflowConfig;
use crate::error::{StudioError, StudioResult};
use crate::generation::{GenerationClient, GenerationJob};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// The job currently owned by the controller.
#[derive(Debug)]
struct TrackedJob {
    tag: JobTag,
    prompt: String,
    job: Option<GenerationJob>,
}

pub struct VideoWorkflowController {
    client: Arc<dyn GenerationClient>,
    config: WorkflowConfig,
    state: WorkflowState,
    current: Option<TrackedJob>,
    timer: Option<PollTimer>,
    last_tag: Option<JobTag>,
    poll_in_flight: bool,
    polls: u32,
    progress: Option<ProgressTicker>,
    notice: Option<String>,
    events_tx: mpsc::UnboundedSender<WorkflowEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkflowEvent>,
}

impl VideoWorkflowController {
    pub fn new(client: Arc<dyn GenerationClient>, config: WorkflowConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            config,
            state: WorkflowState::Idle,
            current: None,
            timer: None,
            last_tag: None,
            poll_in_flight: false,
            polls: 0,
            progress: None,
            notice: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.state.phase()
    }

    pub fn current_tag(&self) -> Option<JobTag> {
        self.current.as_ref().map(|c| c.tag)
    }

    /// Tag of the job whose poll timer is armed, if any.
    pub fn armed_timer(&self) -> Option<JobTag> {
        self.timer.as_ref().map(PollTimer::tag)
    }

    /// Status checks issued for the current job.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn progress_message(&self) -> Option<&'static str> {
        if !self.state.is_busy() {
            return None;
        }
        self.progress.map(|p| p.message_at(Instant::now()))
    }

    /// Nothing in flight and nothing left to wait for.
    pub fn is_settled(&self) -> bool {
        match &self.state {
            WorkflowState::Idle | WorkflowState::Failed(_) => true,
            WorkflowState::Completed { narration, .. } => *narration != NarrationStatus::Pending,
            WorkflowState::Submitting | WorkflowState::Polling => false,
        }
    }

    /// Start a new generation. Any previous job, timer and asset are discarded first.
    pub fn submit(&mut self, prompt: &str) -> StudioResult<JobTag> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(StudioError::EmptyPrompt);
        }

        self.abandon();

        let tag = self.last_tag.map_or_else(JobTag::first, JobTag::next);
        self.last_tag = Some(tag);
        self.current = Some(TrackedJob {
            tag,
            prompt: prompt.to_string(),
            job: None,
        });
        self.state = WorkflowState::Submitting;
        self.progress = Some(ProgressTicker::start(self.config.progress_cadence));

        tracing::info!("🎬 {} submitting video prompt: '{}'", tag, prompt);

        let client = self.client.clone();
        let events = self.events_tx.clone();
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            let result = client.submit_video_job(&prompt).await;
            let _ = events.send(WorkflowEvent::Submitted { tag, result });
        });

        Ok(tag)
    }

    /// Leave the screen: drop the job, the timer and the asset. The remote job keeps running.
    pub fn leave(&mut self) {
        if let Some(tag) = self.current_tag() {
            tracing::info!("👋 Leaving video screen, abandoning {}", tag);
        }
        self.abandon();
        self.state = WorkflowState::Idle;
    }

    fn abandon(&mut self) {
        self.timer = None;
        self.current = None;
        self.poll_in_flight = false;
        self.polls = 0;
        self.progress = None;
        self.notice = None;
        self.state = WorkflowState::Idle;
    }

    fn fail(&mut self, error: StudioError) {
        self.timer = None;
        self.poll_in_flight = false;
        self.progress = None;
        if let Some(current) = self.current.as_mut() {
            current.job = None;
            tracing::warn!("❌ {} failed: {}", current.tag, error);
        }
        self.state = WorkflowState::Failed(error);
    }

    /// Wait for the next event from a spawned call or the poll timer.
    pub async fn next_event(&mut self) -> Option<WorkflowEvent> {
        self.events_rx.recv().await
    }

    /// Process events until the workflow has nothing left in flight.
    pub async fn run_until_settled(&mut self) {
        while !self.is_settled() {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    pub fn handle_event(&mut self, event: WorkflowEvent) {
        let tag = event.tag();
        if self.current_tag() != Some(tag) {
            tracing::debug!("Discarding stale event for {}", tag);
            return;
        }

        match event {
            WorkflowEvent::Tick(tag) => self.on_tick(tag),
            WorkflowEvent::Submitted { tag, result } => self.on_submitted(tag, result),
            WorkflowEvent::Polled { tag, result } => self.on_polled(tag, result),
            WorkflowEvent::AssetFetched {
                tag,
                source_uri,
                result,
            } => self.on_asset_fetched(tag, source_uri, result),
            WorkflowEvent::NarrationGenerated { result, .. } => {
                let WorkflowState::Completed { narration, .. } = &mut self.state else {
                    return;
                };
                match result {
                    Ok(draft) => *narration = NarrationStatus::Ready(draft.into_script()),
                    Err(e) => {
                        tracing::warn!("Failed to generate narration: {}", e);
                        *narration = NarrationStatus::Unavailable;
                        self.notice = Some(NARRATION_FAILED_NOTICE.to_string());
                    }
                }
            }
        }
    }

    fn on_tick(&mut self, tag: JobTag) {
        // Queued ticks can outlive a disarmed timer; only the armed one counts.
        if self.armed_timer() != Some(tag) || !matches!(self.state, WorkflowState::Polling) {
            return;
        }
        if self.poll_in_flight {
            tracing::debug!("{} previous status check still in flight, skipping tick", tag);
            return;
        }
        let Some(job) = self.current.as_ref().and_then(|c| c.job.clone()) else {
            return;
        };

        self.poll_in_flight = true;
        self.polls += 1;
        tracing::debug!("🔄 {} status check #{}", tag, self.polls);

        let client = self.client.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.poll_video_job(&job).await;
            let _ = events.send(WorkflowEvent::Polled { tag, result });
        });
    }

    fn on_submitted(&mut self, tag: JobTag, result: StudioResult<GenerationJob>) {
        if !matches!(self.state, WorkflowState::Submitting) {
            return;
        }
        match result {
            Ok(job) => {
                tracing::info!("📡 {} accepted as {}, polling every {:?}", tag, job.name, self.config.poll_interval);
                if let Some(current) = self.current.as_mut() {
                    current.job = Some(job);
                }
                self.state = WorkflowState::Polling;
                self.timer = Some(PollTimer::arm(tag, self.config.poll_interval, self.events_tx.clone()));
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_polled(&mut self, tag: JobTag, result: StudioResult<GenerationJob>) {
        self.poll_in_flight = false;
        if !matches!(self.state, WorkflowState::Polling) || self.timer.is_none() {
            return;
        }

        let job = match result {
            Ok(job) => job,
            Err(e) => return self.fail(e),
        };

        if !job.done {
            if let Some(current) = self.current.as_mut() {
                current.job = Some(job);
            }
            return;
        }

        let Some(uri) = job.result_uri.clone() else {
            return self.fail(StudioError::NoResultError);
        };

        tracing::info!("✅ {} finished after {} status checks, downloading video", tag, self.polls);
        self.timer = None;
        if let Some(current) = self.current.as_mut() {
            current.job = Some(job);
        }

        let client = self.client.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_video(&uri).await;
            let _ = events.send(WorkflowEvent::AssetFetched {
                tag,
                source_uri: uri,
                result,
            });
        });
    }

    fn on_asset_fetched(&mut self, tag: JobTag, source_uri: String, result: StudioResult<Vec<u8>>) {
        if !matches!(self.state, WorkflowState::Polling) || self.timer.is_some() {
            return;
        }
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(e),
        };

        let asset = VideoAsset::new(source_uri, bytes);
        tracing::info!("💾 {} video ready ({} bytes) as {}", tag, asset.bytes.len(), asset.handle);

        self.progress = None;
        self.state = WorkflowState::Completed {
            asset,
            narration: NarrationStatus::Pending,
        };

        let Some(prompt) = self.current.as_ref().map(|c| c.prompt.clone()) else {
            return;
        };
        let client = self.client.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.generate_narration_script(&prompt).await;
            let _ = events.send(WorkflowEvent::NarrationGenerated { tag, result });
        });
    }

    /// Look up the current asset by handle. Released assets no longer resolve.
    pub fn asset(&self, handle: super::AssetHandle) -> Option<VideoAsset> {
        self.state.asset().filter(|a| a.handle == handle).cloned()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            phase: self.phase(),
            job_tag: self.current_tag(),
            prompt: self.current.as_ref().map(|c| c.prompt.clone()),
            progress_message: self.progress_message(),
            polls: self.polls,
            error: self.state.error().map(ErrorSummary::from),
            notice: self.notice.clone(),
            asset: self.state.asset().map(AssetSummary::from),
            narration: self.state.narration().cloned(),
            narration_pending: matches!(
                self.state,
                WorkflowState::Completed {
                    narration: NarrationStatus::Pending,
                    ..
                }
            ),
            narrating: false,
            playback_error: None,
            updated_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, event: WorkflowEvent) {
        let _ = self.events_tx.send(event);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::error::{StudioError, StudioResult};
    use crate::generation::{GenerationClient, GenerationJob, ImageBlob, NarrationDraft, NarrationScript, SceneResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted generation client with call counters.
    pub struct FakeClient {
        pub submit: Mutex<VecDeque<StudioResult<GenerationJob>>>,
        pub polls: Mutex<VecDeque<StudioResult<GenerationJob>>>,
        pub fetch: Mutex<StudioResult<Vec<u8>>>,
        pub narration: Mutex<StudioResult<NarrationDraft>>,
        pub scenes: Mutex<VecDeque<StudioResult<SceneResult>>>,
        pub poll_delay: Duration,
        pub submit_calls: Mutex<Vec<String>>,
        pub poll_calls: Mutex<Vec<GenerationJob>>,
        pub fetch_calls: Mutex<Vec<String>>,
        pub narration_calls: Mutex<Vec<String>>,
        pub scene_calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        pub fn new() -> Self {
            Self {
                submit: Mutex::new(VecDeque::new()),
                polls: Mutex::new(VecDeque::new()),
                fetch: Mutex::new(Ok(b"video".to_vec())),
                narration: Mutex::new(Ok(NarrationDraft::Parsed(NarrationScript {
                    script: "A cat made of light races through the night.".to_string(),
                    language_code: "en-US".to_string(),
                }))),
                scenes: Mutex::new(VecDeque::new()),
                poll_delay: Duration::ZERO,
                submit_calls: Mutex::new(Vec::new()),
                poll_calls: Mutex::new(Vec::new()),
                fetch_calls: Mutex::new(Vec::new()),
                narration_calls: Mutex::new(Vec::new()),
                scene_calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_polls(self, polls: Vec<StudioResult<GenerationJob>>) -> Self {
            *self.polls.lock().unwrap() = polls.into();
            self
        }

        pub fn with_fetch(self, fetch: StudioResult<Vec<u8>>) -> Self {
            *self.fetch.lock().unwrap() = fetch;
            self
        }

        pub fn with_narration(self, narration: StudioResult<NarrationDraft>) -> Self {
            *self.narration.lock().unwrap() = narration;
            self
        }

        pub fn with_submit(self, submit: StudioResult<GenerationJob>) -> Self {
            self.submit.lock().unwrap().push_back(submit);
            self
        }

        pub fn with_scene(self, scene: StudioResult<SceneResult>) -> Self {
            self.scenes.lock().unwrap().push_back(scene);
            self
        }

        pub fn with_poll_delay(mut self, delay: Duration) -> Self {
            self.poll_delay = delay;
            self
        }

        pub fn poll_count(&self) -> usize {
            self.poll_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationClient for FakeClient {
        async fn submit_video_job(&self, prompt: &str) -> StudioResult<GenerationJob> {
            let n = {
                let mut calls = self.submit_calls.lock().unwrap();
                calls.push(prompt.to_string());
                calls.len()
            };
            self.submit
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerationJob::pending(format!("operations/J{}", n))))
        }

        async fn poll_video_job(&self, job: &GenerationJob) -> StudioResult<GenerationJob> {
            self.poll_calls.lock().unwrap().push(job.clone());
            if !self.poll_delay.is_zero() {
                tokio::time::sleep(self.poll_delay).await;
            }
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerationJob::pending(job.name.clone())))
        }

        async fn fetch_video(&self, result_uri: &str) -> StudioResult<Vec<u8>> {
            self.fetch_calls.lock().unwrap().push(result_uri.to_string());
            self.fetch.lock().unwrap().clone()
        }

        async fn generate_still_images(&self, _prompt: &str, count: usize) -> StudioResult<Vec<ImageBlob>> {
            crate::generation::validate_image_count(count)?;
            Ok((0..count).map(|i| ImageBlob::jpeg(vec![i as u8])).collect())
        }

        async fn generate_narration_script(&self, prompt: &str) -> StudioResult<NarrationDraft> {
            self.narration_calls.lock().unwrap().push(prompt.to_string());
            self.narration.lock().unwrap().clone()
        }

        async fn generate_scene_and_image(&self, context_prompt: &str) -> StudioResult<SceneResult> {
            self.scene_calls.lock().unwrap().push(context_prompt.to_string());
            self.scenes.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(StudioError::InvalidStoryResponse("no scripted scene".to_string()))
            })
        }
    }
}
