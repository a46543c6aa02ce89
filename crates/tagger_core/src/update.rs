use crate::effect::Effect;
use crate::event::{OperatorEvent, SkipReason};
use crate::msg::{Msg, PaneSnapshot};
use crate::nomenclature::{merge_codes, NomenclatureCode};
use crate::outage::{contains_lockout, OutageKey};
use crate::state::{ChatHandle, ChatProgress, ChatStep, PendingCode, Phase, PipelineState, ResumeContext};
use crate::transcript::{analyze, Extraction, Transcript};

/// Pure update function: applies a message to the pipeline and returns the
/// effects the engine must carry out, in order.
pub fn update(mut state: PipelineState, msg: Msg) -> (PipelineState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested => start(&mut state),
        Msg::StopRequested => stop(&mut state),
        Msg::BatchLoaded(chats) => {
            if state.phase() == &Phase::LoadingBatch {
                begin_batch(&mut state, chats)
            } else {
                Vec::new()
            }
        }
        Msg::BatchDelayElapsed => {
            if state.phase() == &Phase::BatchComplete {
                state.set_phase(Phase::LoadingBatch);
                vec![Effect::LoadBatch {
                    cap: state.batch_cap(),
                }]
            } else {
                Vec::new()
            }
        }
        Msg::SettleElapsed => {
            let next = state
                .current_chat()
                .filter(|progress| progress.step == ChatStep::Advancing)
                .map(|progress| progress.index + 1);
            match next {
                Some(index) => open_chat(&mut state, index),
                None => Vec::new(),
            }
        }
        msg => match state.take_phase() {
            Phase::PerChat(progress) => chat_step(&mut state, progress, msg),
            other => {
                state.set_phase(other);
                Vec::new()
            }
        },
    };

    (state, effects)
}

fn start(state: &mut PipelineState) -> Vec<Effect> {
    if state.is_running() {
        return Vec::new();
    }
    state.begin_run();
    vec![Effect::LoadBatch {
        cap: state.batch_cap(),
    }]
}

fn stop(state: &mut PipelineState) -> Vec<Effect> {
    if !state.is_running() {
        return Vec::new();
    }
    let mut effects = Vec::with_capacity(2);
    if state
        .current_chat()
        .is_some_and(|progress| progress.step.notes_editor_open())
    {
        effects.push(Effect::CancelNotesEdit);
    }
    state.set_phase(Phase::Stopped);
    effects.push(Effect::Notify(OperatorEvent::Stopped));
    effects
}

fn begin_batch(state: &mut PipelineState, chats: Vec<ChatHandle>) -> Vec<Effect> {
    state.begin_batch(chats);
    let mut effects = vec![Effect::Notify(OperatorEvent::BatchStarted {
        batch: state.batch_number(),
        chats: state.batch().len(),
    })];
    effects.extend(open_chat(state, 0));
    effects
}

fn open_chat(state: &mut PipelineState, index: usize) -> Vec<Effect> {
    let Some(handle) = state.batch().get(index).cloned() else {
        return finish_batch(state);
    };
    state.set_phase(Phase::PerChat(ChatProgress {
        index,
        handle: handle.clone(),
        panel: None,
        step: ChatStep::Opening,
    }));
    vec![Effect::OpenChat { index, handle }]
}

fn finish_batch(state: &mut PipelineState) -> Vec<Effect> {
    let tally = state.tally();
    state.set_phase(Phase::BatchComplete);
    vec![
        Effect::Notify(OperatorEvent::BatchFinished {
            batch: state.batch_number(),
            tagged: tally.tagged,
            skipped: tally.skipped,
        }),
        Effect::ScheduleNextBatch,
    ]
}

fn chat_step(state: &mut PipelineState, mut progress: ChatProgress, msg: Msg) -> Vec<Effect> {
    let step = std::mem::replace(&mut progress.step, ChatStep::Opening);
    let (next, effects) = match (step, msg) {
        (ChatStep::Opening, Msg::ChatOpened) => {
            (ChatStep::AwaitingWindowReady, vec![Effect::WaitForWindow])
        }
        (ChatStep::AwaitingWindowReady, Msg::WindowReady) => {
            (ChatStep::ScrollingToTop, vec![Effect::ScrollToTop])
        }
        (ChatStep::ScrollingToTop, Msg::ScrollFinished { .. }) => {
            (ChatStep::OutageCheck, vec![Effect::ReadPane])
        }
        (ChatStep::OutageCheck, Msg::PaneRead(snapshot)) => {
            outage_check(state, &mut progress, snapshot)
        }
        (ChatStep::Extracting, Msg::TranscriptRead(transcript)) => {
            extracted(state, &progress, &transcript)
        }
        (ChatStep::LookingUpLetter(context), Msg::LetterPending { url }) if url == context.url => {
            let panel = context
                .panel
                .as_ref()
                .map_or_else(String::new, |panel| panel.name.clone());
            (
                ChatStep::AwaitingLetter(context),
                vec![
                    Effect::Notify(OperatorEvent::UrlAwaiting {
                        url: url.clone(),
                        panel: panel.clone(),
                    }),
                    Effect::AwaitLetter {
                        url,
                        panel_name: panel,
                    },
                ],
            )
        }
        (
            ChatStep::LookingUpLetter(context) | ChatStep::AwaitingLetter(context),
            Msg::LetterResolved { url, letter },
        ) if url == context.url => resume(&progress, context, letter),
        (ChatStep::Merging(pending), Msg::NotesOpened { existing }) => {
            merge(&progress, pending, &existing)
        }
        (ChatStep::Saving { pending, notes }, Msg::NotesSaved) => {
            state.count_tagged();
            let mut effects = Vec::with_capacity(3);
            if !pending.link_counts.is_empty() {
                effects.push(Effect::RecordLinkCounts {
                    code: pending.code,
                    counts: pending.link_counts,
                });
            }
            effects.push(Effect::Notify(OperatorEvent::Tagged {
                chat: progress.handle.label.clone(),
                notes,
            }));
            advance(effects)
        }
        (step, Msg::StepFailed { index, error }) if index == progress.index => {
            state.count_skipped();
            let chat = progress.handle.label.clone();
            let mut effects = Vec::with_capacity(4);
            if step.notes_editor_open() {
                effects.push(Effect::CancelNotesEdit);
            }
            effects.push(Effect::Notify(OperatorEvent::Error {
                chat: chat.clone(),
                message: error,
            }));
            effects.push(Effect::Notify(OperatorEvent::ChatSkipped {
                chat,
                reason: SkipReason::DriverFailure,
            }));
            advance(effects)
        }
        // Stale or out-of-order message; the current step keeps waiting.
        (step, _) => (step, Vec::new()),
    };
    progress.step = next;
    state.set_phase(Phase::PerChat(progress));
    effects
}

fn advance(mut effects: Vec<Effect>) -> (ChatStep, Vec<Effect>) {
    effects.push(Effect::SettleBeforeNextChat);
    (ChatStep::Advancing, effects)
}

fn outage_check(
    state: &mut PipelineState,
    progress: &mut ChatProgress,
    snapshot: PaneSnapshot,
) -> (ChatStep, Vec<Effect>) {
    progress.panel = snapshot.panel;
    if !contains_lockout(&snapshot.text) {
        return (ChatStep::Extracting, vec![Effect::ReadTranscript]);
    }

    let chat = progress.handle.label.clone();
    let mut effects = Vec::with_capacity(3);
    match (&progress.panel, snapshot.panel_label) {
        (Some(panel), _) => {
            let key = OutageKey {
                panel_id: panel.id,
                occurrence: chat.clone(),
            };
            if state.outages_mut().record(key.clone()) {
                effects.push(Effect::Notify(OperatorEvent::OutageDetected {
                    panel_id: panel.id,
                    panel_name: panel.name.clone(),
                }));
                effects.push(Effect::ReportOutage {
                    panel: panel.clone(),
                    key,
                });
            }
        }
        (None, None) => effects.push(Effect::Notify(OperatorEvent::Notice(format!(
            "account locked in {chat} but its panel label could not be read"
        )))),
        (None, Some(label)) => effects.push(Effect::Notify(OperatorEvent::Notice(format!(
            "account locked on unregistered panel {label:?}; add it to the panel list to report it"
        )))),
    }
    state.count_skipped();
    effects.push(Effect::Notify(OperatorEvent::ChatSkipped {
        chat,
        reason: SkipReason::Outage,
    }));
    advance(effects)
}

fn extracted(
    state: &mut PipelineState,
    progress: &ChatProgress,
    transcript: &Transcript,
) -> (ChatStep, Vec<Effect>) {
    let extraction = analyze(transcript);
    if !extraction.is_taggable() {
        state.count_skipped();
        return advance(vec![Effect::Notify(OperatorEvent::ChatSkipped {
            chat: progress.handle.label.clone(),
            reason: SkipReason::NothingFromToday,
        })]);
    }

    let primary_url = extraction.primary_link().map(|link| link.url.clone());
    match primary_url {
        Some(url) => {
            let panel_name = progress
                .panel
                .as_ref()
                .map_or_else(String::new, |panel| panel.name.clone());
            let context = ResumeContext {
                chat_index: progress.index,
                extraction,
                url: url.clone(),
                panel: progress.panel.clone(),
            };
            (
                ChatStep::LookingUpLetter(context),
                vec![Effect::ResolveLetter { url, panel_name }],
            )
        }
        None => begin_merge(progress, &extraction, None),
    }
}

fn resume(
    progress: &ChatProgress,
    context: ResumeContext,
    letter: Option<char>,
) -> (ChatStep, Vec<Effect>) {
    let mut effects = Vec::with_capacity(3);
    if let Some(letter) = letter {
        effects.push(Effect::Notify(OperatorEvent::UrlMapped {
            url: context.url.clone(),
            letter,
        }));
    }
    let (next, merge_effects) = begin_merge(progress, &context.extraction, letter);
    effects.extend(merge_effects);
    (next, effects)
}

fn begin_merge(
    progress: &ChatProgress,
    extraction: &Extraction,
    letter: Option<char>,
) -> (ChatStep, Vec<Effect>) {
    let code = NomenclatureCode::synthesize(
        progress.panel.as_ref(),
        extraction.code_time(),
        extraction.today,
        letter,
        extraction.load_confirmed(),
    );
    let pending = PendingCode {
        code,
        link_counts: extraction.link_counts(),
    };
    (
        ChatStep::Merging(pending),
        vec![
            Effect::Notify(OperatorEvent::Tagging {
                chat: progress.handle.label.clone(),
                code: code.to_string(),
            }),
            Effect::OpenNotesEditor,
        ],
    )
}

fn merge(progress: &ChatProgress, pending: PendingCode, existing: &str) -> (ChatStep, Vec<Effect>) {
    let outcome = merge_codes(existing, &[pending.code]);
    if outcome.changed {
        let notes = outcome.text();
        (
            ChatStep::Saving {
                pending,
                notes: notes.clone(),
            },
            vec![Effect::WriteNotes { text: notes }],
        )
    } else {
        advance(vec![
            Effect::CancelNotesEdit,
            Effect::Notify(OperatorEvent::AlreadyTagged {
                chat: progress.handle.label.clone(),
            }),
        ])
    }
}
