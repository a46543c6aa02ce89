use std::future::Future;
use std::time::Duration;

use tagger_core::{ChatHandle, ChatMessage};
use tokio_util::sync::CancellationToken;

use crate::error::DriverError;
use crate::settings::WaitBudget;

/// Primitive operations over the live inbox document.
///
/// Implementations perform one attempt per call; waiting and retrying is done
/// by the runner through [`wait_for`] so budgets stay in one place.
#[async_trait::async_trait]
pub trait UiDriver: Send + Sync {
    /// The first `cap` conversations of the list, top to bottom.
    async fn list_chats(&self, cap: usize) -> Result<Vec<ChatHandle>, DriverError>;
    /// Scrolls the entry into view and clicks it.
    async fn open_chat(&self, chat: &ChatHandle) -> Result<(), DriverError>;
    /// True once the conversation pane has rendered.
    async fn is_window_ready(&self) -> Result<bool, DriverError>;
    async fn scroll_messages_to_top(&self) -> Result<(), DriverError>;
    async fn scroll_offset(&self) -> Result<i64, DriverError>;
    /// Full visible text of the message pane.
    async fn read_pane_text(&self) -> Result<String, DriverError>;
    /// Panel name shown by the assignment widget, undecorated or not.
    async fn read_panel_label(&self) -> Result<Option<String>, DriverError>;
    async fn read_messages(&self) -> Result<Vec<ChatMessage>, DriverError>;
    /// Clicks the notes edit button; false when it is not on screen yet.
    async fn click_edit_notes(&self) -> Result<bool, DriverError>;
    /// Current notes text; `None` while the field has not appeared.
    async fn read_notes_field(&self) -> Result<Option<String>, DriverError>;
    /// Replaces the field's text the way typing would.
    async fn write_notes(&self, text: &str) -> Result<(), DriverError>;
    async fn save_notes(&self) -> Result<(), DriverError>;
    async fn cancel_notes_edit(&self) -> Result<(), DriverError>;
}

/// Sleeps unless the stop flag is raised first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), DriverError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(DriverError::Stopped)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(DriverError::Stopped),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Polls `probe` within `budget` until it yields a value.
pub async fn wait_for<T, F, Fut>(
    what: &str,
    budget: WaitBudget,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, DriverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, DriverError>>,
{
    pause(budget.initial_delay, cancel).await?;
    for attempt in 1..=budget.attempts {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if attempt < budget.attempts {
            pause(budget.interval, cancel).await?;
        }
    }
    Err(DriverError::NotFound {
        what: what.to_string(),
        attempts: budget.attempts,
    })
}
