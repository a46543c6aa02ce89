use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tagger_core::{
    resolve_panel, update, Effect, Msg, OperatorEvent, PaneSnapshot, PanelRecord, PipelineState,
    ScrollConvergence, ScrollVerdict, Transcript,
};
use tagger_logging::{tagger_debug, tagger_error, tagger_info, tagger_warn};
use tokio_util::sync::CancellationToken;

use crate::alerts::{AlertSink, NullAlertSink};
use crate::driver::{pause, wait_for, UiDriver};
use crate::error::DriverError;
use crate::events::{Clock, EventSink, SystemClock};
use crate::metrics::CollectedMetrics;
use crate::registry::{PanelRegistry, StaticPanelRegistry};
use crate::resolver::LetterResolver;
use crate::settings::PipelineSettings;

/// Totals of one `run`, across every batch it went through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: u64,
    pub tagged: usize,
    pub skipped: usize,
}

/// Drives one pipeline instance: feeds messages to the pure core and
/// executes the effects it returns against the inbox and the remote stores.
pub struct PipelineRunner {
    driver: Arc<dyn UiDriver>,
    resolver: Arc<LetterResolver>,
    events: Arc<dyn EventSink>,
    registry: Arc<dyn PanelRegistry>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
    fallback_panels: Vec<PanelRecord>,
    batch_limit: Option<u64>,
    metrics: Arc<Mutex<CollectedMetrics>>,
    stop: CancellationToken,
    running: AtomicBool,
}

/// Clears the running flag however `run` exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PipelineRunner {
    pub fn new(
        driver: Arc<dyn UiDriver>,
        resolver: Arc<LetterResolver>,
        events: Arc<dyn EventSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            driver,
            resolver,
            events,
            registry: Arc::new(StaticPanelRegistry::default()),
            alerts: Arc::new(NullAlertSink),
            clock: Arc::new(SystemClock),
            settings,
            fallback_panels: Vec::new(),
            batch_limit: None,
            metrics: Arc::new(Mutex::new(CollectedMetrics::new())),
            stop: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn PanelRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Panels consulted when a label is not in the registry.
    pub fn with_fallback_panels(mut self, panels: Vec<PanelRecord>) -> Self {
        self.fallback_panels = panels;
        self
    }

    /// Stops on its own after `batches` completed batches.
    pub fn with_batch_limit(mut self, batches: u64) -> Self {
        self.batch_limit = Some(batches);
        self
    }

    /// Cancelling this token is the operator's stop request.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn metrics(&self) -> Arc<Mutex<CollectedMetrics>> {
        Arc::clone(&self.metrics)
    }

    /// True while a `run` call is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs until stopped or until the batch limit is reached.
    ///
    /// One instance drives one inbox: a call made while another is in
    /// progress returns an empty summary without touching the driver.
    pub async fn run(&self) -> RunSummary {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tagger_warn!("start ignored: the pipeline is already running");
            self.events.emit(OperatorEvent::Notice(
                "the pipeline is already running".into(),
            ));
            return RunSummary::default();
        }
        let _running = RunningGuard(&self.running);

        let mut state = PipelineState::with_batch_cap(self.settings.batch_cap);
        let mut summary = RunSummary::default();
        let mut inbox = VecDeque::from([Msg::StartRequested]);

        while let Some(mut msg) = inbox.pop_front() {
            if self.stop.is_cancelled() && state.is_running() && msg != Msg::StopRequested {
                inbox.clear();
                msg = Msg::StopRequested;
            }
            let (next, effects) = update(state, msg);
            state = next;
            tagger_logging::set_current_batch(state.batch_number());

            for effect in effects {
                if self.stop.is_cancelled() && state.is_running() {
                    inbox.clear();
                    inbox.push_back(Msg::StopRequested);
                    break;
                }
                match self.execute(effect, &state, &mut summary).await {
                    Ok(Some(reply)) => inbox.push_back(reply),
                    Ok(None) => {}
                    Err(DriverError::Stopped) => {
                        inbox.clear();
                        inbox.push_back(Msg::StopRequested);
                        break;
                    }
                    Err(err) => {
                        inbox.clear();
                        match state.current_chat() {
                            Some(progress) => {
                                tagger_warn!("chat {} failed: {err}", progress.handle.label);
                                inbox.push_back(Msg::StepFailed {
                                    index: progress.index,
                                    error: err.to_string(),
                                });
                            }
                            None => {
                                tagger_error!("pipeline step failed outside a chat: {err}");
                                inbox.push_back(Msg::StopRequested);
                            }
                        }
                        break;
                    }
                }
            }
        }

        tagger_info!(
            "run finished: {} batches, {} tagged, {} skipped",
            summary.batches,
            summary.tagged,
            summary.skipped
        );
        summary
    }

    async fn execute(
        &self,
        effect: Effect,
        state: &PipelineState,
        summary: &mut RunSummary,
    ) -> Result<Option<Msg>, DriverError> {
        let driver = self.driver.as_ref();
        match effect {
            Effect::LoadBatch { cap } => match driver.list_chats(cap).await {
                Ok(chats) => Ok(Some(Msg::BatchLoaded(chats))),
                Err(DriverError::Stopped) => Err(DriverError::Stopped),
                Err(err) => {
                    self.notify(OperatorEvent::Notice(format!(
                        "could not read the conversation list: {err}"
                    )));
                    Ok(Some(Msg::BatchLoaded(Vec::new())))
                }
            },
            Effect::OpenChat { index, handle } => {
                tagger_debug!("opening chat {index}: {}", handle.label);
                driver.open_chat(&handle).await?;
                Ok(Some(Msg::ChatOpened))
            }
            Effect::WaitForWindow => {
                wait_for(
                    "conversation window",
                    self.settings.window_ready,
                    &self.stop,
                    move || async move { driver.is_window_ready().await.map(|ready| ready.then_some(())) },
                )
                .await?;
                Ok(Some(Msg::WindowReady))
            }
            Effect::ScrollToTop => self.scroll_to_top().await.map(Some),
            Effect::ReadPane => self.read_pane().await.map(Some),
            Effect::ReportOutage { panel, key } => {
                let alerts = Arc::clone(&self.alerts);
                tokio::spawn(async move {
                    match alerts.report(&panel).await {
                        Ok(()) => tagger_info!(
                            "outage reported for panel {} ({})",
                            panel.name,
                            key.occurrence
                        ),
                        Err(err) => tagger_warn!("could not report outage for {}: {err}", panel.name),
                    }
                });
                Ok(None)
            }
            Effect::ReadTranscript => {
                let observed_at = self.clock.now().with_timezone(&self.settings.timezone);
                let messages = driver.read_messages().await?;
                tagger_debug!("read {} messages", messages.len());
                Ok(Some(Msg::TranscriptRead(Transcript {
                    observed_at,
                    messages,
                })))
            }
            Effect::ResolveLetter { url, .. } => {
                let letter = self.resolver.lookup(&url).await;
                Ok(Some(match letter {
                    Some(letter) => Msg::LetterResolved {
                        url,
                        letter: Some(letter),
                    },
                    None => Msg::LetterPending { url },
                }))
            }
            Effect::AwaitLetter { url, panel_name } => {
                let letter = self
                    .resolver
                    .await_resolution(&url, &panel_name, &self.stop)
                    .await;
                Ok(Some(Msg::LetterResolved { url, letter }))
            }
            Effect::OpenNotesEditor => {
                wait_for(
                    "notes edit button",
                    self.settings.edit_button,
                    &self.stop,
                    move || async move { driver.click_edit_notes().await.map(|clicked| clicked.then_some(())) },
                )
                .await?;
                let existing = wait_for(
                    "notes field",
                    self.settings.notes_field,
                    &self.stop,
                    || driver.read_notes_field(),
                )
                .await?;
                Ok(Some(Msg::NotesOpened { existing }))
            }
            Effect::WriteNotes { text } => {
                driver.write_notes(&text).await?;
                pause(self.settings.write_settle, &self.stop).await?;
                driver.save_notes().await?;
                Ok(Some(Msg::NotesSaved))
            }
            Effect::CancelNotesEdit => {
                if let Err(err) = driver.cancel_notes_edit().await {
                    tagger_warn!("could not cancel the notes edit: {err}");
                }
                Ok(None)
            }
            Effect::RecordLinkCounts { code, counts } => {
                self.metrics
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(&code, &counts);
                Ok(None)
            }
            Effect::Notify(event) => {
                match &event {
                    OperatorEvent::BatchStarted { .. } => summary.batches += 1,
                    OperatorEvent::Tagged { .. } => summary.tagged += 1,
                    OperatorEvent::ChatSkipped { .. } => summary.skipped += 1,
                    _ => {}
                }
                self.notify(event);
                Ok(None)
            }
            Effect::SettleBeforeNextChat => {
                pause(self.settings.between_chats, &self.stop).await?;
                Ok(Some(Msg::SettleElapsed))
            }
            Effect::ScheduleNextBatch => {
                if self
                    .batch_limit
                    .is_some_and(|limit| state.batch_number() >= limit)
                {
                    tagger_info!("batch limit reached after {} batches", state.batch_number());
                    return Ok(Some(Msg::StopRequested));
                }
                pause(self.settings.batch_delay, &self.stop).await?;
                Ok(Some(Msg::BatchDelayElapsed))
            }
        }
    }

    async fn scroll_to_top(&self) -> Result<Msg, DriverError> {
        let driver = self.driver.as_ref();
        let initial = driver.scroll_offset().await?;
        let mut detector = ScrollConvergence::with_budget(
            initial,
            self.settings.scroll_stable_samples,
            self.settings.scroll_max_attempts,
        );
        loop {
            driver.scroll_messages_to_top().await?;
            pause(self.settings.scroll_settle, &self.stop).await?;
            let offset = driver.scroll_offset().await?;
            let (converged, attempts) = match detector.observe(offset) {
                ScrollVerdict::Continue => {
                    self.events.emit(OperatorEvent::ScrollProgress {
                        attempt: detector.attempts(),
                        offset,
                    });
                    continue;
                }
                ScrollVerdict::Converged { attempts } => (true, attempts),
                ScrollVerdict::GaveUp { attempts } => {
                    tagger_warn!("scroll offset still moving after {attempts} attempts");
                    (false, attempts)
                }
            };
            pause(self.settings.post_scroll_settle, &self.stop).await?;
            return Ok(Msg::ScrollFinished {
                converged,
                attempts,
            });
        }
    }

    async fn read_pane(&self) -> Result<Msg, DriverError> {
        let text = self.driver.read_pane_text().await?;
        let panel_label = self.driver.read_panel_label().await?;
        let panel = match panel_label.as_deref() {
            Some(label) => {
                let registry = self.registry.panels().await;
                resolve_panel(label, &registry, &self.fallback_panels)
            }
            None => None,
        };
        if let (Some(label), None) = (panel_label.as_deref(), panel.as_ref()) {
            tagger_debug!("panel label {label:?} is not registered");
        }
        Ok(Msg::PaneRead(PaneSnapshot {
            text,
            panel_label,
            panel,
        }))
    }

    fn notify(&self, event: OperatorEvent) {
        match &event {
            OperatorEvent::Error { .. } | OperatorEvent::OutageDetected { .. } => {
                tagger_warn!("{event}")
            }
            OperatorEvent::ScrollProgress { .. } => tagger_debug!("{event}"),
            _ => tagger_info!("{event}"),
        }
        self.events.emit(event);
    }
}
