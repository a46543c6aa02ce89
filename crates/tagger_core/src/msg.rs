use crate::panel::PanelRecord;
use crate::state::ChatHandle;
use crate::transcript::Transcript;

/// What the outage check read from the open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneSnapshot {
    pub text: String,
    /// Raw panel label shown by the assignment widget, if one was found.
    pub panel_label: Option<String>,
    /// Registry entry the label resolved to.
    pub panel: Option<PanelRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Operator asked the pipeline to run.
    StartRequested,
    /// Operator asked the pipeline to stop.
    StopRequested,
    /// The capped window of conversations at the top of the list.
    BatchLoaded(Vec<ChatHandle>),
    ChatOpened,
    WindowReady,
    /// Scroll-to-top loop ended, successfully or not.
    ScrollFinished { converged: bool, attempts: u32 },
    PaneRead(PaneSnapshot),
    TranscriptRead(Transcript),
    /// The resolver has no letter yet and asked an operator.
    LetterPending { url: String },
    /// Lookup or operator decision finished; `None` means skipped or timed out.
    LetterResolved { url: String, letter: Option<char> },
    /// Notes editor is open and holds `existing`.
    NotesOpened { existing: String },
    NotesSaved,
    /// A driver step for chat `index` exhausted its retry budget.
    StepFailed { index: usize, error: String },
    SettleElapsed,
    BatchDelayElapsed,
}
