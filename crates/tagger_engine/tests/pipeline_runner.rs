use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tagger_core::{Author, ChatHandle, ChatMessage, OperatorEvent, PanelRecord, SkipReason, TimeInfo};
use tagger_engine::{
    AlertSink, DriverError, EventSink, FixedClock, LetterResolver, MappingStore,
    MemoryMappingStore, OperatorPrompt, PendingResolution, PipelineRunner, PipelineSettings,
    RemoteError, ResolverSettings, RunSummary, StaticPanelRegistry, UiDriver,
};

const LINK: &str = "https://fb.me/1AbCdEf";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tagger_logging::initialize_for_tests);
}

fn goatgaming() -> PanelRecord {
    PanelRecord::new(10, "Goatgaming").with_numbers(vec!["5491100000000".into()])
}

#[derive(Clone)]
struct FakeChat {
    label: String,
    pane_text: String,
    panel_label: Option<String>,
    messages: Vec<ChatMessage>,
    notes: String,
}

fn linked_chat(label: &str) -> FakeChat {
    FakeChat {
        label: label.into(),
        pane_text: "Hola, vengo del anuncio".into(),
        panel_label: Some("Panel Goatgaming Cambiar".into()),
        messages: vec![ChatMessage {
            author: Author::Customer,
            text: "Hola, vengo del anuncio".into(),
            links: vec![LINK.into()],
            time: Some(TimeInfo::new(
                "5/3/2026 a las 10:10",
                Some("20 minutos".into()),
            )),
        }],
        notes: String::new(),
    }
}

fn stale_chat(label: &str) -> FakeChat {
    FakeChat {
        label: label.into(),
        pane_text: "Hola".into(),
        panel_label: Some("Panel Goatgaming Cambiar".into()),
        messages: vec![ChatMessage {
            author: Author::Customer,
            text: "Hola".into(),
            links: Vec::new(),
            time: Some(TimeInfo::new("1/3/2026 a las 09:00", None)),
        }],
        notes: String::new(),
    }
}

#[derive(Default)]
struct Inbox {
    chats: Vec<FakeChat>,
    open: Option<usize>,
    offset: i64,
    editing: bool,
    draft: String,
    saved: Vec<(String, String)>,
    cancels: usize,
    hide_notes_field: bool,
}

/// In-memory inbox that behaves like the live document would.
#[derive(Default)]
struct FakeInbox {
    inbox: Mutex<Inbox>,
}

impl FakeInbox {
    fn with_chats(chats: Vec<FakeChat>) -> Self {
        Self {
            inbox: Mutex::new(Inbox {
                chats,
                ..Inbox::default()
            }),
        }
    }

    fn saved(&self) -> Vec<(String, String)> {
        self.inbox.lock().unwrap().saved.clone()
    }

    fn cancels(&self) -> usize {
        self.inbox.lock().unwrap().cancels
    }

    fn current(&self) -> Result<FakeChat, DriverError> {
        let inbox = self.inbox.lock().unwrap();
        inbox
            .open
            .and_then(|index| inbox.chats.get(index).cloned())
            .ok_or_else(|| DriverError::Io("no chat open".into()))
    }
}

#[async_trait::async_trait]
impl UiDriver for FakeInbox {
    async fn list_chats(&self, cap: usize) -> Result<Vec<ChatHandle>, DriverError> {
        let inbox = self.inbox.lock().unwrap();
        Ok(inbox
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
        let mut inbox = self.inbox.lock().unwrap();
        inbox.open = Some(chat.ordinal);
        inbox.offset = 900;
        inbox.editing = false;
        Ok(())
    }

    async fn is_window_ready(&self) -> Result<bool, DriverError> {
        Ok(self.inbox.lock().unwrap().open.is_some())
    }

    async fn scroll_messages_to_top(&self) -> Result<(), DriverError> {
        let mut inbox = self.inbox.lock().unwrap();
        inbox.offset = (inbox.offset - 300).max(0);
        Ok(())
    }

    async fn scroll_offset(&self) -> Result<i64, DriverError> {
        Ok(self.inbox.lock().unwrap().offset)
    }

    async fn read_pane_text(&self) -> Result<String, DriverError> {
        Ok(self.current()?.pane_text)
    }

    async fn read_panel_label(&self) -> Result<Option<String>, DriverError> {
        Ok(self.current()?.panel_label)
    }

    async fn read_messages(&self) -> Result<Vec<ChatMessage>, DriverError> {
        Ok(self.current()?.messages)
    }

    async fn click_edit_notes(&self) -> Result<bool, DriverError> {
        self.inbox.lock().unwrap().editing = true;
        Ok(true)
    }

    async fn read_notes_field(&self) -> Result<Option<String>, DriverError> {
        let notes = self.current()?.notes;
        let inbox = self.inbox.lock().unwrap();
        if inbox.editing && !inbox.hide_notes_field {
            Ok(Some(notes))
        } else {
            Ok(None)
        }
    }

    async fn write_notes(&self, text: &str) -> Result<(), DriverError> {
        self.inbox.lock().unwrap().draft = text.to_string();
        Ok(())
    }

    async fn save_notes(&self) -> Result<(), DriverError> {
        let mut inbox = self.inbox.lock().unwrap();
        let index = inbox
            .open
            .ok_or_else(|| DriverError::Io("no chat open".into()))?;
        let draft = inbox.draft.clone();
        inbox.chats[index].notes = draft.clone();
        let label = inbox.chats[index].label.clone();
        inbox.saved.push((label, draft));
        inbox.editing = false;
        Ok(())
    }

    async fn cancel_notes_edit(&self) -> Result<(), DriverError> {
        let mut inbox = self.inbox.lock().unwrap();
        inbox.editing = false;
        inbox.cancels += 1;
        Ok(())
    }
}

#[derive(Default)]
struct SilentPrompt;

impl OperatorPrompt for SilentPrompt {
    fn show(&self, _head: &PendingResolution, _queued: usize) {}
    fn rejected(&self, _input: &str) {}
    fn close(&self) {}
    fn attention(&self) {}
}

#[derive(Default)]
struct RecordingEvents {
    events: Mutex<Vec<OperatorEvent>>,
}

impl RecordingEvents {
    fn contains(&self, event: &OperatorEvent) -> bool {
        self.events.lock().unwrap().contains(event)
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: OperatorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
struct CountingAlerts {
    reports: AtomicUsize,
}

#[async_trait::async_trait]
impl AlertSink for CountingAlerts {
    async fn report(&self, _panel: &PanelRecord) -> Result<(), RemoteError> {
        self.reports.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fixture {
    driver: Arc<FakeInbox>,
    store: Arc<MemoryMappingStore>,
    resolver: Arc<LetterResolver>,
    events: Arc<RecordingEvents>,
    runner: Arc<PipelineRunner>,
}

fn fixture(
    chats: Vec<FakeChat>,
    store: MemoryMappingStore,
    customize: impl FnOnce(PipelineRunner) -> PipelineRunner,
) -> Fixture {
    init_logging();
    let driver = Arc::new(FakeInbox::with_chats(chats));
    let store = Arc::new(store);
    let events = Arc::new(RecordingEvents::default());
    let resolver = Arc::new(LetterResolver::new(
        store.clone() as Arc<dyn MappingStore>,
        Arc::new(SilentPrompt),
        events.clone(),
        ResolverSettings::default(),
    ));
    // 05/03/2026 10:30 in Buenos Aires.
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 5, 13, 30, 0).unwrap());
    let runner = PipelineRunner::new(
        driver.clone(),
        resolver.clone(),
        events.clone(),
        PipelineSettings::default(),
    )
    .with_registry(Arc::new(StaticPanelRegistry::new(vec![goatgaming()])))
    .with_clock(Arc::new(clock));
    Fixture {
        driver,
        store,
        resolver,
        events,
        runner: Arc::new(customize(runner)),
    }
}

async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if ready() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition never became true");
}

#[tokio::test(start_paused = true)]
async fn known_letter_is_written_and_stale_chat_skipped() {
    let f = fixture(
        vec![linked_chat("Juan Perez"), stale_chat("Ana Gomez")],
        MemoryMappingStore::with_entries([(LINK.to_string(), 'B')]),
        |runner| runner.with_batch_limit(1),
    );

    let summary = f.runner.run().await;

    assert_eq!(
        summary,
        RunSummary {
            batches: 1,
            tagged: 1,
            skipped: 1,
        }
    );
    assert_eq!(
        f.driver.saved(),
        vec![("Juan Perez".to_string(), "05-03-10B".to_string())]
    );
    assert!(f.events.contains(&OperatorEvent::ChatSkipped {
        chat: "Ana Gomez".into(),
        reason: SkipReason::NothingFromToday,
    }));
    assert!(f.events.contains(&OperatorEvent::Stopped));
    let metrics = f.runner.metrics();
    assert_eq!(metrics.lock().unwrap().count("05-03-10B", LINK), 1);
}

#[tokio::test(start_paused = true)]
async fn second_pass_leaves_up_to_date_notes_alone() {
    let f = fixture(
        vec![linked_chat("Juan Perez")],
        MemoryMappingStore::with_entries([(LINK.to_string(), 'B')]),
        |runner| runner.with_batch_limit(2),
    );

    let summary = f.runner.run().await;

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.tagged, 1);
    assert_eq!(f.driver.saved().len(), 1);
    assert_eq!(f.driver.cancels(), 1);
    assert!(f.events.contains(&OperatorEvent::AlreadyTagged {
        chat: "Juan Perez".into(),
    }));
}

#[tokio::test(start_paused = true)]
async fn operator_letter_unblocks_the_chat() {
    let f = fixture(
        vec![linked_chat("Juan Perez")],
        MemoryMappingStore::new(),
        |runner| runner.with_batch_limit(1),
    );

    let run = tokio::spawn({
        let runner = f.runner.clone();
        async move { runner.run().await }
    });
    let resolver = f.resolver.clone();
    wait_until(move || !resolver.pending().is_empty()).await;
    assert!(f.events.contains(&OperatorEvent::UrlAwaiting {
        url: LINK.into(),
        panel: "Goatgaming".into(),
    }));

    assert_eq!(f.resolver.submit_letter("k"), Ok('K'));
    let summary = run.await.unwrap();

    assert_eq!(summary.tagged, 1);
    assert_eq!(
        f.driver.saved(),
        vec![("Juan Perez".to_string(), "05-03-10K".to_string())]
    );
    assert_eq!(
        f.store.fetch(LINK).await.unwrap().map(|entry| entry.letter),
        Some('K')
    );
}

#[tokio::test(start_paused = true)]
async fn stop_while_waiting_for_a_letter_ends_the_run() {
    let f = fixture(
        vec![linked_chat("Juan Perez")],
        MemoryMappingStore::new(),
        |runner| runner,
    );
    let stop = f.runner.stop_token();

    let run = tokio::spawn({
        let runner = f.runner.clone();
        async move { runner.run().await }
    });
    let resolver = f.resolver.clone();
    wait_until(move || !resolver.pending().is_empty()).await;
    stop.cancel();

    let summary = run.await.unwrap();
    assert_eq!(summary.tagged, 0);
    assert!(f.driver.saved().is_empty());
    assert!(f.resolver.pending().is_empty());
    assert!(f.events.contains(&OperatorEvent::Stopped));
}

#[tokio::test(start_paused = true)]
async fn outage_is_reported_once_per_run() {
    let mut locked = linked_chat("Juan Perez");
    locked.pane_text = "Business account locked. Contact support.".into();
    let alerts = Arc::new(CountingAlerts::default());
    let f = fixture(vec![locked], MemoryMappingStore::new(), {
        let alerts = alerts.clone();
        move |runner| runner.with_alerts(alerts).with_batch_limit(2)
    });

    let summary = f.runner.run().await;
    tokio::task::yield_now().await;

    assert_eq!(summary.skipped, 2);
    assert_eq!(alerts.reports.load(Ordering::SeqCst), 1);
    assert!(f.events.contains(&OperatorEvent::OutageDetected {
        panel_id: 10,
        panel_name: "Goatgaming".into(),
    }));
    assert!(f.driver.saved().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_notes_field_skips_the_chat_and_closes_the_editor() {
    let f = fixture(
        vec![linked_chat("Juan Perez")],
        MemoryMappingStore::with_entries([(LINK.to_string(), 'B')]),
        |runner| runner.with_batch_limit(1),
    );
    f.driver.inbox.lock().unwrap().hide_notes_field = true;

    let summary = f.runner.run().await;

    assert_eq!(summary.tagged, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(f.driver.cancels(), 1);
    assert!(f.events.contains(&OperatorEvent::ChatSkipped {
        chat: "Juan Perez".into(),
        reason: SkipReason::DriverFailure,
    }));
}

#[tokio::test(start_paused = true)]
async fn overlapping_start_is_ignored_while_a_run_is_in_progress() {
    let f = fixture(
        vec![linked_chat("Juan Perez")],
        MemoryMappingStore::new(),
        |runner| runner.with_batch_limit(1),
    );

    let first = tokio::spawn({
        let runner = f.runner.clone();
        async move { runner.run().await }
    });
    let resolver = f.resolver.clone();
    wait_until(move || !resolver.pending().is_empty()).await;
    assert!(f.runner.is_running());

    assert_eq!(f.runner.run().await, RunSummary::default());
    assert!(f.events.contains(&OperatorEvent::Notice(
        "the pipeline is already running".into()
    )));
    assert!(f.runner.is_running());

    assert_eq!(f.resolver.submit_letter("b"), Ok('B'));
    let summary = first.await.unwrap();
    assert_eq!(summary.tagged, 1);
    assert!(!f.runner.is_running());
    assert_eq!(
        f.driver.saved(),
        vec![("Juan Perez".to_string(), "05-03-10B".to_string())]
    );

    // Once the first run is over a new start is accepted again.
    let again = f.runner.run().await;
    assert_eq!(again.batches, 1);
    assert_eq!(again.tagged, 0);
    assert_eq!(f.driver.saved().len(), 1);
}
