//! Campaign-letter resolution shared by every chat of a pipeline instance.
//!
//! A URL's letter is looked up in the session cache, then in the shared
//! mapping store. When neither knows it, the URL joins a queue whose head is
//! shown to an operator while the store keeps being polled, so a decision
//! taken in another tab or on another machine is picked up without local
//! input. Whoever answers first (operator, store, or the poll budget running
//! out) settles the URL for every waiter.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tagger_core::OperatorEvent;
use tagger_logging::{tagger_debug, tagger_info, tagger_warn};
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ResolverError;
use crate::events::EventSink;
use crate::mapping::MappingStore;
use crate::settings::ResolverSettings;

/// A URL waiting for an operator to pick its letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResolution {
    pub url: String,
    pub panel_name: String,
}

/// Presentation side of the queue. Answers come back through
/// [`LetterResolver::submit_letter`] and [`LetterResolver::skip`].
pub trait OperatorPrompt: Send + Sync {
    /// `head` is now the focused item; `queued` includes it.
    fn show(&self, head: &PendingResolution, queued: usize);
    fn rejected(&self, input: &str);
    fn close(&self);
    /// Attention cue, repeated while the prompt stays open.
    fn attention(&self);
}

/// Validates operator input: exactly one letter A-Z, any case, surrounding
/// whitespace ignored.
pub fn parse_letter(input: &str) -> Result<char, ResolverError> {
    let mut chars = input.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(ResolverError::InvalidOperatorInput(input.to_string())),
    }
}

#[derive(Debug, Clone)]
struct Decision {
    url: String,
    letter: Option<char>,
}

#[derive(Default)]
struct ResolverState {
    cache: HashMap<String, char>,
    queue: VecDeque<PendingResolution>,
    prompt_open: bool,
    cue: Option<CancellationToken>,
}

enum PromptAction {
    Show(PendingResolution, usize),
    Close,
    Nothing,
}

pub struct LetterResolver {
    store: Arc<dyn MappingStore>,
    prompt: Arc<dyn OperatorPrompt>,
    events: Arc<dyn EventSink>,
    settings: ResolverSettings,
    state: Mutex<ResolverState>,
    decisions: broadcast::Sender<Decision>,
}

impl LetterResolver {
    pub fn new(
        store: Arc<dyn MappingStore>,
        prompt: Arc<dyn OperatorPrompt>,
        events: Arc<dyn EventSink>,
        settings: ResolverSettings,
    ) -> Self {
        let (decisions, _) = broadcast::channel(64);
        Self {
            store,
            prompt,
            events,
            settings,
            state: Mutex::new(ResolverState::default()),
            decisions,
        }
    }

    fn state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cached(&self, url: &str) -> Option<char> {
        self.state().cache.get(url).copied()
    }

    /// URLs currently queued, head first.
    pub fn pending(&self) -> Vec<PendingResolution> {
        self.state().queue.iter().cloned().collect()
    }

    pub fn is_prompt_open(&self) -> bool {
        self.state().prompt_open
    }

    /// Loads every mapping the store knows into the session cache.
    pub async fn warm_cache(&self) -> usize {
        match self.store.fetch_all().await {
            Ok(entries) => {
                let count = entries.len();
                let mut state = self.state();
                for entry in entries {
                    state.cache.insert(entry.url, entry.letter);
                }
                tagger_info!("mapping cache warmed with {count} URLs");
                count
            }
            Err(err) => {
                tagger_warn!("could not warm mapping cache: {err}");
                0
            }
        }
    }

    /// Cache, then store. Never prompts.
    pub async fn lookup(&self, url: &str) -> Option<char> {
        if let Some(letter) = self.cached(url) {
            tagger_debug!("cache hit {url} -> {letter}");
            return Some(letter);
        }
        self.fetch_remote(url).await
    }

    /// Full protocol: lookup, then queue for an operator and wait.
    pub async fn resolve(
        &self,
        url: &str,
        panel_name: &str,
        cancel: &CancellationToken,
    ) -> Option<char> {
        match self.lookup(url).await {
            Some(letter) => Some(letter),
            None => self.await_resolution(url, panel_name, cancel).await,
        }
    }

    /// Queues `url` for an operator and waits for whichever answer comes
    /// first. `None` means skipped, timed out or stopped.
    pub async fn await_resolution(
        &self,
        url: &str,
        panel_name: &str,
        cancel: &CancellationToken,
    ) -> Option<char> {
        let mut decisions = self.decisions.subscribe();
        if let Some(letter) = self.cached(url) {
            return Some(letter);
        }
        self.enqueue(PendingResolution {
            url: url.to_string(),
            panel_name: panel_name.to_string(),
        });

        let period = self.settings.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.dequeue(url, None);
                    return None;
                }
                decision = decisions.recv() => match decision {
                    Ok(decision) if decision.url == url => return decision.letter,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if let Some(letter) = self.cached(url) {
                            return Some(letter);
                        }
                        if !self.is_queued(url) {
                            return None;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return self.cached(url),
                },
                _ = ticker.tick() => {
                    polls += 1;
                    if let Some(letter) = self.poll_once(url).await {
                        tagger_info!("{url} resolved elsewhere as {letter}");
                        self.settle(url, Some(letter));
                        return Some(letter);
                    }
                    if polls >= self.settings.max_polls {
                        tagger_warn!("no letter for {url} after {polls} polls; continuing without one");
                        self.settle(url, None);
                        return None;
                    }
                }
            }
        }
    }

    /// Operator answer for the focused URL.
    pub fn submit_letter(&self, input: &str) -> Result<char, ResolverError> {
        let head = self.focused().ok_or(ResolverError::NoActivePrompt)?;
        let letter = match parse_letter(input) {
            Ok(letter) => letter,
            Err(err) => {
                self.prompt.rejected(input);
                return Err(err);
            }
        };
        tagger_info!("operator mapped {} to {letter}", head.url);
        self.persist(head.clone(), letter);
        self.settle(&head.url, Some(letter));
        Ok(letter)
    }

    /// Drops the focused URL without a letter.
    pub fn skip(&self) -> Result<PendingResolution, ResolverError> {
        let head = self.focused().ok_or(ResolverError::NoActivePrompt)?;
        tagger_info!("operator skipped {}", head.url);
        self.settle(&head.url, None);
        Ok(head)
    }

    fn focused(&self) -> Option<PendingResolution> {
        let state = self.state();
        if state.prompt_open {
            state.queue.front().cloned()
        } else {
            None
        }
    }

    fn is_queued(&self, url: &str) -> bool {
        self.state().queue.iter().any(|pending| pending.url == url)
    }

    async fn fetch_remote(&self, url: &str) -> Option<char> {
        match self.store.fetch(url).await {
            Ok(Some(entry)) => {
                tagger_info!(
                    "mapping store: {url} -> {} (used {} times)",
                    entry.letter,
                    entry.use_count
                );
                self.state().cache.insert(url.to_string(), entry.letter);
                Some(entry.letter)
            }
            Ok(None) => None,
            Err(err) => {
                tagger_warn!("mapping store lookup for {url} failed: {err}");
                None
            }
        }
    }

    async fn poll_once(&self, url: &str) -> Option<char> {
        if let Some(letter) = self.cached(url) {
            return Some(letter);
        }
        match self.store.fetch(url).await {
            Ok(Some(entry)) => {
                self.state().cache.insert(url.to_string(), entry.letter);
                Some(entry.letter)
            }
            Ok(None) => None,
            Err(err) => {
                tagger_debug!("poll for {url} failed: {err}");
                None
            }
        }
    }

    /// Best-effort write to the shared store; the session cache already has it.
    fn persist(&self, pending: PendingResolution, letter: char) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.save(&pending.url, letter, &pending.panel_name).await {
                Ok(()) => tagger_debug!("persisted {} -> {letter}", pending.url),
                Err(err) => tagger_warn!(
                    "could not persist {} -> {letter}: {err}; keeping it for this session",
                    pending.url
                ),
            }
        });
    }

    fn enqueue(&self, pending: PendingResolution) {
        let (action, cue) = {
            let mut state = self.state();
            if !state.queue.iter().any(|queued| queued.url == pending.url) {
                state.queue.push_back(pending);
            }
            match state.queue.front().cloned() {
                Some(head) if !state.prompt_open => {
                    state.prompt_open = true;
                    let cue = CancellationToken::new();
                    state.cue = Some(cue.clone());
                    let queued = state.queue.len();
                    (PromptAction::Show(head, queued), Some(cue))
                }
                _ => (PromptAction::Nothing, None),
            }
        };
        self.apply(action);
        if let Some(cue) = cue {
            self.spawn_attention_cue(cue);
        }
    }

    /// Removes `url` from the queue and caches its letter, if any.
    fn dequeue(&self, url: &str, letter: Option<char>) {
        let action = {
            let mut state = self.state();
            if let Some(letter) = letter {
                state.cache.insert(url.to_string(), letter);
            }
            let was_head = state.queue.front().is_some_and(|head| head.url == url);
            state.queue.retain(|pending| pending.url != url);
            if !state.prompt_open {
                PromptAction::Nothing
            } else {
                match state.queue.front() {
                    None => {
                        state.prompt_open = false;
                        if let Some(cue) = state.cue.take() {
                            cue.cancel();
                        }
                        PromptAction::Close
                    }
                    Some(head) if was_head => PromptAction::Show(head.clone(), state.queue.len()),
                    Some(_) => PromptAction::Nothing,
                }
            }
        };
        self.apply(action);
    }

    /// Dequeues and tells every waiter for `url`.
    fn settle(&self, url: &str, letter: Option<char>) {
        self.dequeue(url, letter);
        let _ = self.decisions.send(Decision {
            url: url.to_string(),
            letter,
        });
    }

    fn apply(&self, action: PromptAction) {
        match action {
            PromptAction::Show(head, queued) => {
                tagger_info!("asking operator for {} ({queued} queued)", head.url);
                self.prompt.show(&head, queued);
            }
            PromptAction::Close => {
                self.prompt.close();
                self.events.emit(OperatorEvent::QueueDrained);
                tagger_info!("letter queue drained");
            }
            PromptAction::Nothing => {}
        }
    }

    fn spawn_attention_cue(&self, cue: CancellationToken) {
        let prompt = Arc::clone(&self.prompt);
        let period = self.settings.attention_interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cue.cancelled() => break,
                    _ = ticker.tick() => prompt.attention(),
                }
            }
        });
    }
}
