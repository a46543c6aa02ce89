use std::fmt;

/// Why a chat was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No tracking link from today and the conversation did not start today.
    NothingFromToday,
    /// The account behind the chat is locked.
    Outage,
    /// A driver step ran out of its retry budget.
    DriverFailure,
}

/// Discrete events surfaced to whoever presents the pipeline to an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorEvent {
    BatchStarted { batch: u64, chats: usize },
    BatchFinished { batch: u64, tagged: usize, skipped: usize },
    Stopped,
    ScrollProgress { attempt: u32, offset: i64 },
    Tagging { chat: String, code: String },
    Tagged { chat: String, notes: String },
    AlreadyTagged { chat: String },
    ChatSkipped { chat: String, reason: SkipReason },
    UrlMapped { url: String, letter: char },
    UrlAwaiting { url: String, panel: String },
    QueueDrained,
    OutageDetected { panel_id: u32, panel_name: String },
    Notice(String),
    Error { chat: String, message: String },
}

impl fmt::Display for OperatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorEvent::BatchStarted { batch, chats } => {
                write!(f, "batch {batch} started with {chats} chats")
            }
            OperatorEvent::BatchFinished {
                batch,
                tagged,
                skipped,
            } => write!(f, "batch {batch} finished: {tagged} tagged, {skipped} skipped"),
            OperatorEvent::Stopped => f.write_str("stopped"),
            OperatorEvent::ScrollProgress { attempt, offset } => {
                write!(f, "scrolling to top (attempt {attempt}, offset {offset})")
            }
            OperatorEvent::Tagging { chat, code } => write!(f, "tagging {chat} with {code}"),
            OperatorEvent::Tagged { chat, notes } => write!(f, "{chat} notes saved: {notes}"),
            OperatorEvent::AlreadyTagged { chat } => write!(f, "{chat} already up to date"),
            OperatorEvent::ChatSkipped { chat, reason } => {
                write!(f, "{chat} skipped ({reason:?})")
            }
            OperatorEvent::UrlMapped { url, letter } => write!(f, "{url} -> {letter}"),
            OperatorEvent::UrlAwaiting { url, panel } => {
                write!(f, "letter needed for {url} (panel {panel})")
            }
            OperatorEvent::QueueDrained => f.write_str("no URLs awaiting a letter"),
            OperatorEvent::OutageDetected {
                panel_id,
                panel_name,
            } => write!(f, "account locked on panel {panel_name} ({panel_id})"),
            OperatorEvent::Notice(text) => f.write_str(text),
            OperatorEvent::Error { chat, message } => write!(f, "{chat}: {message}"),
        }
    }
}
