//! Tagger core: pure chat-processing state machine, nomenclature engine and
//! the text classifiers they rely on.
mod effect;
mod event;
mod load_phrase;
mod msg;
mod nomenclature;
mod outage;
mod panel;
mod scroll;
mod state;
mod time_info;
mod transcript;
mod update;

pub use effect::Effect;
pub use event::{OperatorEvent, SkipReason};
pub use load_phrase::{match_load_phrase, normalize_text};
pub use msg::{Msg, PaneSnapshot};
pub use nomenclature::{
    merge_codes, Base, CodeParseError, CodeSet, MergeOutcome, NomenclatureCode, UNKNOWN_PANEL_ID,
};
pub use outage::{contains_lockout, OutageKey, OutageLedger, LOCKOUT_MARKER};
pub use panel::{clean_panel_label, match_panel, resolve_panel, PanelRecord};
pub use scroll::{ScrollConvergence, ScrollVerdict, DEFAULT_MAX_ATTEMPTS, DEFAULT_STABLE_SAMPLES};
pub use state::{
    BatchTally, ChatHandle, ChatProgress, ChatStep, PendingCode, Phase, PipelineState,
    ResumeContext, DEFAULT_BATCH_CAP,
};
pub use time_info::{
    derive_clock, parse_absolute_date, parse_relative, CivilDate, RelativeUnit, TimeInfo,
    CIVIL_TIMEZONE,
};
pub use transcript::{analyze, is_tracking_link, Author, ChatMessage, Extraction, MetaLink, Transcript};
pub use update::update;
