use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::nomenclature::NomenclatureCode;
use crate::outage::OutageLedger;
use crate::panel::PanelRecord;
use crate::transcript::Extraction;

/// Conversations taken from the top of the list per batch.
pub const DEFAULT_BATCH_CAP: usize = 25;

/// One conversation entry of the current batch. Valid for that batch only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHandle {
    pub ordinal: usize,
    /// Display name of the conversation in the list.
    pub label: String,
}

/// Minimal context needed to finish a chat once its letter is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeContext {
    pub chat_index: usize,
    pub extraction: Extraction,
    pub url: String,
    pub panel: Option<PanelRecord>,
}

/// A synthesized code on its way into the notes field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    pub code: NomenclatureCode,
    pub link_counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStep {
    Opening,
    AwaitingWindowReady,
    ScrollingToTop,
    OutageCheck,
    Extracting,
    /// Cache or remote lookup in flight; does not block on an operator.
    LookingUpLetter(ResumeContext),
    /// Suspended until the resolver answers for this URL.
    AwaitingLetter(ResumeContext),
    Merging(PendingCode),
    /// Notes rewritten with `notes`; waiting for the driver to confirm.
    Saving { pending: PendingCode, notes: String },
    Advancing,
}

impl ChatStep {
    pub(crate) fn notes_editor_open(&self) -> bool {
        matches!(self, ChatStep::Merging(_) | ChatStep::Saving { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatProgress {
    pub index: usize,
    pub handle: ChatHandle,
    pub panel: Option<PanelRecord>,
    pub step: ChatStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    LoadingBatch,
    PerChat(ChatProgress),
    /// Batch done; waiting out the delay before the next one.
    BatchComplete,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchTally {
    pub tagged: usize,
    pub skipped: usize,
}

/// State owned by one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    phase: Phase,
    batch_cap: usize,
    batch_number: u64,
    batch: Vec<ChatHandle>,
    tally: BatchTally,
    outages: OutageLedger,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::with_batch_cap(DEFAULT_BATCH_CAP)
    }

    pub fn with_batch_cap(batch_cap: usize) -> Self {
        Self {
            phase: Phase::Idle,
            batch_cap: batch_cap.max(1),
            batch_number: 0,
            batch: Vec::new(),
            tally: BatchTally::default(),
            outages: OutageLedger::default(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn batch_cap(&self) -> usize {
        self.batch_cap
    }

    /// Number of the batch being processed, starting at 1 for each run.
    pub fn batch_number(&self) -> u64 {
        self.batch_number
    }

    pub fn batch(&self) -> &[ChatHandle] {
        &self.batch
    }

    pub fn tally(&self) -> BatchTally {
        self.tally
    }

    pub fn outages(&self) -> &OutageLedger {
        &self.outages
    }

    /// True while a run is in progress, including the inter-batch delay.
    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            Phase::LoadingBatch | Phase::PerChat(_) | Phase::BatchComplete
        )
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }

    /// Chat progress, if the pipeline is inside a conversation.
    pub fn current_chat(&self) -> Option<&ChatProgress> {
        match &self.phase {
            Phase::PerChat(progress) => Some(progress),
            _ => None,
        }
    }

    /// Context of the chat suspended on a letter decision.
    pub fn awaiting_letter(&self) -> Option<&ResumeContext> {
        match self.current_chat().map(|progress| &progress.step) {
            Some(ChatStep::AwaitingLetter(context)) => Some(context),
            _ => None,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn take_phase(&mut self) -> Phase {
        std::mem::take(&mut self.phase)
    }

    pub(crate) fn begin_run(&mut self) {
        self.batch_number = 0;
        self.batch.clear();
        self.tally = BatchTally::default();
        self.outages.clear();
        self.phase = Phase::LoadingBatch;
    }

    pub(crate) fn begin_batch(&mut self, chats: Vec<ChatHandle>) {
        self.batch_number += 1;
        self.batch = chats;
        self.batch.truncate(self.batch_cap);
        self.tally = BatchTally::default();
    }

    pub(crate) fn outages_mut(&mut self) -> &mut OutageLedger {
        &mut self.outages
    }

    pub(crate) fn count_tagged(&mut self) {
        self.tally.tagged += 1;
    }

    pub(crate) fn count_skipped(&mut self) {
        self.tally.skipped += 1;
    }
}
