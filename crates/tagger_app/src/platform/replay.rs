//! Replays a recorded inbox through the pipeline.
//!
//! A snapshot lists conversations the way the live inbox showed them: pane
//! text, panel label, messages and current notes. The driver keeps notes
//! written during the run so they can be saved afterwards.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagger_core::{ChatHandle, ChatMessage};
use tagger_engine::{DriverError, UiDriver};

/// Pixels one "scroll to top" command moves the recorded pane.
const SCROLL_STEP: i64 = 600;
/// Approximate rendered height of one message.
const MESSAGE_HEIGHT: i64 = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct InboxSnapshot {
    /// Instant the snapshot was taken; replays compute "today" from it.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    pub chats: Vec<RecordedChat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedChat {
    pub label: String,
    #[serde(default)]
    pub pane_text: String,
    #[serde(default)]
    pub panel_label: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub notes: String,
}

/// Notes of one conversation after the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedNotes {
    pub chat: String,
    pub notes: String,
}

pub fn load_snapshot(path: &Path) -> anyhow::Result<InboxSnapshot> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading inbox {}", path.display()))?;
    ron::from_str(&content).with_context(|| format!("parsing inbox {}", path.display()))
}

#[derive(Default)]
struct ReplayState {
    chats: Vec<RecordedChat>,
    open: Option<usize>,
    offset: i64,
    editing: bool,
    draft: String,
    writes: usize,
}

pub struct ReplayDriver {
    state: Mutex<ReplayState>,
}

impl ReplayDriver {
    pub fn new(chats: Vec<RecordedChat>) -> Self {
        Self {
            state: Mutex::new(ReplayState {
                chats,
                ..ReplayState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_open<T>(&self, read: impl FnOnce(&RecordedChat) -> T) -> Result<T, DriverError> {
        let state = self.state();
        state
            .open
            .and_then(|index| state.chats.get(index))
            .map(read)
            .ok_or_else(|| DriverError::Io("no conversation is open".into()))
    }

    /// Every conversation's notes as they stand now.
    pub fn notes(&self) -> Vec<SavedNotes> {
        self.state()
            .chats
            .iter()
            .map(|chat| SavedNotes {
                chat: chat.label.clone(),
                notes: chat.notes.clone(),
            })
            .collect()
    }

    /// Number of notes saves performed.
    pub fn writes(&self) -> usize {
        self.state().writes
    }
}

#[async_trait::async_trait]
impl UiDriver for ReplayDriver {
    async fn list_chats(&self, cap: usize) -> Result<Vec<ChatHandle>, DriverError> {
        Ok(self
            .state()
            .chats
            .iter()
            .take(cap)
            .enumerate()
            .map(|(ordinal, chat)| ChatHandle {
                ordinal,
                label: chat.label.clone(),
            })
            .collect())
    }

    async fn open_chat(&self, chat: &ChatHandle) -> Result<(), DriverError> {
        let mut state = self.state();
        let Some(recorded) = state.chats.get(chat.ordinal) else {
            return Err(DriverError::NotFound {
                what: format!("conversation {}", chat.label),
                attempts: 1,
            });
        };
        let offset = recorded.messages.len() as i64 * MESSAGE_HEIGHT;
        state.open = Some(chat.ordinal);
        state.offset = offset;
        state.editing = false;
        Ok(())
    }

    async fn is_window_ready(&self) -> Result<bool, DriverError> {
        Ok(self.state().open.is_some())
    }

    async fn scroll_messages_to_top(&self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.offset = (state.offset - SCROLL_STEP).max(0);
        Ok(())
    }

    async fn scroll_offset(&self) -> Result<i64, DriverError> {
        Ok(self.state().offset)
    }

    async fn read_pane_text(&self) -> Result<String, DriverError> {
        self.with_open(|chat| {
            if chat.pane_text.is_empty() {
                chat.messages
                    .iter()
                    .map(|message| message.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                chat.pane_text.clone()
            }
        })
    }

    async fn read_panel_label(&self) -> Result<Option<String>, DriverError> {
        self.with_open(|chat| chat.panel_label.clone())
    }

    async fn read_messages(&self) -> Result<Vec<ChatMessage>, DriverError> {
        self.with_open(|chat| chat.messages.clone())
    }

    async fn click_edit_notes(&self) -> Result<bool, DriverError> {
        let mut state = self.state();
        if state.open.is_none() {
            return Ok(false);
        }
        state.editing = true;
        Ok(true)
    }

    async fn read_notes_field(&self) -> Result<Option<String>, DriverError> {
        let editing = self.state().editing;
        if !editing {
            return Ok(None);
        }
        self.with_open(|chat| Some(chat.notes.clone()))
    }

    async fn write_notes(&self, text: &str) -> Result<(), DriverError> {
        self.state().draft = text.to_string();
        Ok(())
    }

    async fn save_notes(&self) -> Result<(), DriverError> {
        let mut state = self.state();
        let draft = std::mem::take(&mut state.draft);
        let index = state
            .open
            .filter(|_| state.editing)
            .ok_or_else(|| DriverError::Io("notes editor is not open".into()))?;
        if let Some(chat) = state.chats.get_mut(index) {
            chat.notes = draft;
        }
        state.editing = false;
        state.writes += 1;
        Ok(())
    }

    async fn cancel_notes_edit(&self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.editing = false;
        state.draft.clear();
        Ok(())
    }
}
