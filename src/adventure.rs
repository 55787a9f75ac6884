// src/adventure.rs
//! Turn-based text and image adventure: the append-only story log, the
//! prompts built from it, and the session that alternates player actions with
//! generated scenes.

use crate::error::{StudioError, StudioResult};
use crate::generation::{GenerationClient, SceneResult};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const GENRES: [&str; 4] = ["Fantasy", "Sci-Fi", "Mystery", "Cyberpunk"];

pub const START_FAILED_MESSAGE: &str = "Failed to start the adventure. Please check your API key and try again.";
pub const CONTINUE_FAILED_MESSAGE: &str = "The story could not continue. An unexpected error occurred.";

const SYSTEM_INSTRUCTION: &str = "You are a master storyteller and game master for a dynamic, open-ended text and image adventure game. Your goal is to create an immersive and engaging experience. For each turn, you will receive the story so far and the player's action. You must respond with a valid JSON object matching the provided schema.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoryEntry {
    Scene {
        id: u64,
        text: String,
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Action {
        id: u64,
        text: String,
    },
}

impl StoryEntry {
    pub fn id(&self) -> u64 {
        match self {
            StoryEntry::Scene { id, .. } | StoryEntry::Action { id, .. } => *id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            StoryEntry::Scene { text, .. } | StoryEntry::Action { text, .. } => text,
        }
    }
}

/// Ordered story log. Entries are only ever appended; ids never repeat.
#[derive(Debug, Clone, Default)]
pub struct StoryLog {
    entries: Vec<StoryEntry>,
    next_id: u64,
}

impl StoryLog {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn push_scene(&mut self, scene: SceneResult) -> u64 {
        let id = self.allocate_id();
        self.entries.push(StoryEntry::Scene {
            id,
            text: scene.scene_text,
            image_url: scene.image_url,
        });
        id
    }

    pub fn push_action(&mut self, text: impl Into<String>) -> u64 {
        let id = self.allocate_id();
        self.entries.push(StoryEntry::Action { id, text: text.into() });
        id
    }

    pub fn entries(&self) -> &[StoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent scene; the one currently on screen.
    pub fn current_scene(&self) -> Option<&StoryEntry> {
        self.entries.iter().rev().find(|e| matches!(e, StoryEntry::Scene { .. }))
    }
}

pub fn opening_prompt(genre: &str) -> String {
    format!(
        "Start a text adventure game in a {} setting. Describe the opening scene and what the player sees. Set a mysterious and intriguing tone.",
        genre
    )
}

/// Full context prompt for the next turn. `log` already contains `action`.
pub fn story_prompt(log: &StoryLog, action: Option<&str>) -> String {
    let mut context = String::from("Here is the story so far:\n");
    if log.is_empty() {
        context.push_str("The story has not yet begun.\n");
    } else {
        for entry in log.entries() {
            match entry {
                StoryEntry::Scene { text, .. } => context.push_str(&format!("Scene: {}\n", text)),
                StoryEntry::Action { text, .. } => context.push_str(&format!("Player Action: {}\n", text)),
            }
        }
    }

    let player_prompt = match action {
        Some(action) => format!(
            "The player's next action is: \"{}\". Generate the next part of the story.",
            action
        ),
        None => "Generate the opening scene for the adventure.".to_string(),
    };

    format!("{}\n\n{}\n{}", SYSTEM_INSTRUCTION, context, player_prompt)
}

pub fn scene_download_name(id: u64) -> String {
    format!("gemini-adventure-scene-{}.jpg", id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdventurePhase {
    #[default]
    Menu,
    Loading,
    Playing,
}

/// Issued when a turn starts; a turn only lands if its epoch is still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    epoch: u64,
    pub prompt: String,
}

#[derive(Debug, Default)]
pub struct AdventureSession {
    phase: AdventurePhase,
    genre: Option<String>,
    log: StoryLog,
    error: Option<String>,
    epoch: u64,
}

impl AdventureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AdventurePhase {
        self.phase
    }

    pub fn log(&self) -> &StoryLog {
        &self.log
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin_start(&mut self, genre: &str) -> StudioResult<TurnTicket> {
        let genre = genre.trim();
        if genre.is_empty() {
            return Err(StudioError::Conflict("Please choose a genre.".to_string()));
        }
        if self.phase() == AdventurePhase::Loading {
            return Err(StudioError::Conflict("The storyteller is still working.".to_string()));
        }

        self.epoch += 1;
        self.log = StoryLog::default();
        self.genre = Some(genre.to_string());
        self.error = None;
        self.phase = AdventurePhase::Loading;
        tracing::info!("🗺️ Starting {} adventure", genre);

        Ok(TurnTicket {
            epoch: self.epoch,
            prompt: opening_prompt(genre),
        })
    }

    pub fn finish_start(&mut self, ticket: TurnTicket, result: StudioResult<SceneResult>) {
        if ticket.epoch != self.epoch {
            tracing::debug!("Discarding opening scene from an abandoned adventure");
            return;
        }
        match result {
            Ok(scene) => {
                self.log.push_scene(scene);
                self.phase = AdventurePhase::Playing;
            }
            Err(e) => {
                tracing::error!("❌ Failed to start adventure: {}", e);
                self.error = Some(START_FAILED_MESSAGE.to_string());
                self.phase = AdventurePhase::Menu;
            }
        }
    }

    pub fn begin_action(&mut self, action: &str) -> StudioResult<TurnTicket> {
        let action = action.trim();
        if action.is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        if self.phase() != AdventurePhase::Playing {
            return Err(StudioError::Conflict("No adventure in progress.".to_string()));
        }

        self.log.push_action(action);
        self.error = None;
        self.phase = AdventurePhase::Loading;
        tracing::info!("🎲 Player action: '{}'", action);

        Ok(TurnTicket {
            epoch: self.epoch,
            prompt: story_prompt(&self.log, Some(action)),
        })
    }

    /// A failed turn keeps the player's action in the log and stays playable.
    pub fn finish_action(&mut self, ticket: TurnTicket, result: StudioResult<SceneResult>) {
        if ticket.epoch != self.epoch {
            tracing::debug!("Discarding scene from an abandoned adventure");
            return;
        }
        match result {
            Ok(scene) => {
                self.log.push_scene(scene);
            }
            Err(e) => {
                tracing::error!("❌ Story could not continue: {}", e);
                self.error = Some(CONTINUE_FAILED_MESSAGE.to_string());
            }
        }
        self.phase = AdventurePhase::Playing;
    }

    pub fn back_to_menu(&mut self) {
        self.epoch += 1;
        self.log = StoryLog::default();
        self.genre = None;
        self.error = None;
        self.phase = AdventurePhase::Menu;
    }

    pub fn view(&self) -> AdventureView {
        let current_scene = self.log.current_scene().and_then(|entry| match entry {
            StoryEntry::Scene { id, text, image_url } => Some(CurrentScene {
                id: *id,
                text: text.clone(),
                image_url: image_url.clone(),
                download_name: scene_download_name(*id),
            }),
            StoryEntry::Action { .. } => None,
        });
        AdventureView {
            phase: self.phase(),
            genre: self.genre.clone(),
            genres: GENRES.to_vec(),
            entries: self.log.entries().to_vec(),
            current_scene,
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentScene {
    pub id: u64,
    pub text: String,
    pub image_url: String,
    pub download_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdventureView {
    pub phase: AdventurePhase,
    pub genre: Option<String>,
    pub genres: Vec<&'static str>,
    pub entries: Vec<StoryEntry>,
    pub current_scene: Option<CurrentScene>,
    pub error: Option<String>,
}

/// Session plus the client that advances it. The lock is never held across
/// a remote call, so the story can be viewed while a turn is loading.
pub struct Adventure {
    client: Arc<dyn GenerationClient>,
    session: Mutex<AdventureSession>,
}

impl Adventure {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            session: Mutex::new(AdventureSession::new()),
        }
    }

    pub async fn view(&self) -> AdventureView {
        self.session.lock().await.view()
    }

    pub async fn start(&self, genre: &str) -> StudioResult<AdventureView> {
        let ticket = self.session.lock().await.begin_start(genre)?;
        let result = self.client.generate_scene_and_image(&ticket.prompt).await;
        let mut session = self.session.lock().await;
        session.finish_start(ticket, result);
        Ok(session.view())
    }

    pub async fn act(&self, action: &str) -> StudioResult<AdventureView> {
        let ticket = self.session.lock().await.begin_action(action)?;
        let result = self.client.generate_scene_and_image(&ticket.prompt).await;
        let mut session = self.session.lock().await;
        session.finish_action(ticket, result);
        Ok(session.view())
    }

    pub async fn back_to_menu(&self) -> AdventureView {
        let mut session = self.session.lock().await;
        session.back_to_menu();
        session.view()
    }
}
