use std::collections::BTreeMap;

use crate::event::OperatorEvent;
use crate::nomenclature::NomenclatureCode;
use crate::outage::OutageKey;
use crate::panel::PanelRecord;
use crate::state::ChatHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Re-read up to `cap` conversations from the top of the list.
    LoadBatch { cap: usize },
    OpenChat { index: usize, handle: ChatHandle },
    WaitForWindow,
    ScrollToTop,
    ReadPane,
    /// Fire-and-forget alert for a locked account.
    ReportOutage { panel: PanelRecord, key: OutageKey },
    ReadTranscript,
    /// Cache and remote lookup; answers with `LetterResolved` or `LetterPending`.
    ResolveLetter { url: String, panel_name: String },
    /// Block until an operator, another instance or the poll budget decides.
    AwaitLetter { url: String, panel_name: String },
    OpenNotesEditor,
    WriteNotes { text: String },
    CancelNotesEdit,
    RecordLinkCounts {
        code: NomenclatureCode,
        counts: BTreeMap<String, u32>,
    },
    Notify(OperatorEvent),
    SettleBeforeNextChat,
    ScheduleNextBatch,
}
