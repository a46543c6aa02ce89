use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tagger_core::OperatorEvent;
use tagger_engine::{
    EventSink, LetterResolver, MappingStore, MemoryMappingStore, OperatorPrompt,
    PendingResolution, ResolverError, ResolverSettings,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const LINK: &str = "https://fb.me/1AbCdEf";
const OTHER: &str = "https://www.facebook.com/100064/posts/998";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tagger_logging::initialize_for_tests);
}

#[derive(Default)]
struct RecordingPrompt {
    shown: Mutex<Vec<(String, usize)>>,
    rejected: Mutex<Vec<String>>,
    closed: AtomicUsize,
    cues: AtomicUsize,
}

impl RecordingPrompt {
    fn shown(&self) -> Vec<(String, usize)> {
        self.shown.lock().unwrap().clone()
    }
}

impl OperatorPrompt for RecordingPrompt {
    fn show(&self, head: &PendingResolution, queued: usize) {
        self.shown.lock().unwrap().push((head.url.clone(), queued));
    }

    fn rejected(&self, input: &str) {
        self.rejected.lock().unwrap().push(input.to_string());
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn attention(&self) {
        self.cues.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingEvents {
    events: Mutex<Vec<OperatorEvent>>,
}

impl RecordingEvents {
    fn drained_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| **event == OperatorEvent::QueueDrained)
            .count()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: OperatorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    resolver: Arc<LetterResolver>,
    prompt: Arc<RecordingPrompt>,
    events: Arc<RecordingEvents>,
}

fn harness(store: Arc<dyn MappingStore>) -> Harness {
    init_logging();
    let prompt = Arc::new(RecordingPrompt::default());
    let events = Arc::new(RecordingEvents::default());
    let resolver = Arc::new(LetterResolver::new(
        store,
        prompt.clone(),
        events.clone(),
        ResolverSettings::default(),
    ));
    Harness {
        resolver,
        prompt,
        events,
    }
}

fn spawn_wait(
    resolver: &Arc<LetterResolver>,
    url: &'static str,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<Option<char>> {
    let resolver = Arc::clone(resolver);
    let cancel = cancel.clone();
    tokio::spawn(async move { resolver.await_resolution(url, "Goatgaming", &cancel).await })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn lookup_reads_the_store_once_then_the_cache() {
    let store = Arc::new(MemoryMappingStore::with_entries([(LINK.to_string(), 'B')]));
    let h = harness(store.clone());

    assert_eq!(h.resolver.lookup(LINK).await, Some('B'));
    assert_eq!(h.resolver.lookup(LINK).await, Some('B'));
    assert_eq!(h.resolver.cached(LINK), Some('B'));
    // One lookup reached the store; this fetch is the second use.
    assert_eq!(store.fetch(LINK).await.unwrap().unwrap().use_count, 2);
    assert_eq!(h.resolver.lookup(OTHER).await, None);
    assert!(h.prompt.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn warm_cache_loads_every_mapping() {
    let store = Arc::new(MemoryMappingStore::with_entries([
        (LINK.to_string(), 'B'),
        (OTHER.to_string(), 'Q'),
    ]));
    let h = harness(store);
    assert_eq!(h.resolver.warm_cache().await, 2);
    assert_eq!(h.resolver.cached(OTHER), Some('Q'));
}

#[tokio::test(start_paused = true)]
async fn one_answer_releases_every_waiter_and_is_persisted() {
    let store = Arc::new(MemoryMappingStore::new());
    let h = harness(store.clone());
    let cancel = CancellationToken::new();

    let first = spawn_wait(&h.resolver, LINK, &cancel);
    let second = spawn_wait(&h.resolver, LINK, &cancel);
    settle().await;

    assert_eq!(h.prompt.shown(), vec![(LINK.to_string(), 1)]);
    assert_eq!(h.resolver.pending().len(), 1);

    assert_eq!(h.resolver.submit_letter(" b "), Ok('B'));
    assert_eq!(first.await.unwrap(), Some('B'));
    assert_eq!(second.await.unwrap(), Some('B'));
    settle().await;

    assert_eq!(h.resolver.cached(LINK), Some('B'));
    assert!(h.resolver.pending().is_empty());
    assert!(!h.resolver.is_prompt_open());
    assert_eq!(h.prompt.closed.load(Ordering::SeqCst), 1);
    assert_eq!(h.events.drained_count(), 1);
    assert_eq!(store.fetch(LINK).await.unwrap().map(|entry| entry.letter), Some('B'));
}

#[tokio::test(start_paused = true)]
async fn decision_on_another_instance_is_picked_up_by_polling() {
    let store = Arc::new(MemoryMappingStore::new());
    let here = harness(store.clone());
    let there = harness(store.clone());
    let cancel = CancellationToken::new();

    let waiting_here = spawn_wait(&here.resolver, LINK, &cancel);
    let waiting_there = spawn_wait(&there.resolver, LINK, &cancel);
    settle().await;

    assert_eq!(there.resolver.submit_letter("k"), Ok('K'));
    assert_eq!(waiting_there.await.unwrap(), Some('K'));

    let started = Instant::now();
    assert_eq!(waiting_here.await.unwrap(), Some('K'));
    assert!(started.elapsed() <= Duration::from_secs(3));
    assert_eq!(here.resolver.cached(LINK), Some('K'));
    assert!(here.resolver.pending().is_empty());
    assert_eq!(here.prompt.closed.load(Ordering::SeqCst), 1);
    assert!(here.prompt.rejected.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn skip_moves_the_prompt_to_the_next_url() {
    let h = harness(Arc::new(MemoryMappingStore::new()));
    let cancel = CancellationToken::new();

    let first = spawn_wait(&h.resolver, LINK, &cancel);
    settle().await;
    let second = spawn_wait(&h.resolver, OTHER, &cancel);
    settle().await;
    assert_eq!(h.resolver.pending().len(), 2);

    let skipped = h.resolver.skip().unwrap();
    assert_eq!(skipped.url, LINK);
    assert_eq!(first.await.unwrap(), None);

    assert_eq!(h.resolver.submit_letter("a"), Ok('A'));
    assert_eq!(second.await.unwrap(), Some('A'));
    assert_eq!(
        h.prompt.shown(),
        vec![(LINK.to_string(), 1), (OTHER.to_string(), 1)]
    );
    assert_eq!(h.resolver.cached(LINK), None);
    assert_eq!(h.events.drained_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_input_keeps_the_url_queued() {
    let h = harness(Arc::new(MemoryMappingStore::new()));
    assert_eq!(
        h.resolver.submit_letter("b"),
        Err(ResolverError::NoActivePrompt)
    );
    assert!(matches!(h.resolver.skip(), Err(ResolverError::NoActivePrompt)));

    let cancel = CancellationToken::new();
    let waiting = spawn_wait(&h.resolver, LINK, &cancel);
    settle().await;

    for bad in ["", "bb", "7", "ñ"] {
        assert_eq!(
            h.resolver.submit_letter(bad),
            Err(ResolverError::InvalidOperatorInput(bad.to_string()))
        );
    }
    assert_eq!(
        *h.prompt.rejected.lock().unwrap(),
        vec!["", "bb", "7", "ñ"]
    );
    assert_eq!(h.resolver.pending().len(), 1);

    assert_eq!(h.resolver.submit_letter("Z"), Ok('Z'));
    assert_eq!(waiting.await.unwrap(), Some('Z'));
}

#[tokio::test(start_paused = true)]
async fn unanswered_url_times_out_after_the_poll_budget() {
    let h = harness(Arc::new(MemoryMappingStore::new()));
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let letter = h.resolver.await_resolution(LINK, "Oro", &cancel).await;

    assert_eq!(letter, None);
    assert!(started.elapsed() >= Duration::from_secs(3 * 300));
    assert!(h.resolver.pending().is_empty());
    assert!(h.prompt.cues.load(Ordering::SeqCst) >= 59);
    assert_eq!(h.events.drained_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_withdraws_the_url_quietly() {
    let h = harness(Arc::new(MemoryMappingStore::new()));
    let cancel = CancellationToken::new();

    let waiting = spawn_wait(&h.resolver, LINK, &cancel);
    settle().await;
    cancel.cancel();

    assert_eq!(waiting.await.unwrap(), None);
    assert!(h.resolver.pending().is_empty());
    assert!(!h.resolver.is_prompt_open());
    assert_eq!(h.prompt.closed.load(Ordering::SeqCst), 1);
}
