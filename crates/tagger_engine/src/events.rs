use chrono::{DateTime, Utc};
use tagger_core::OperatorEvent;
use tokio::sync::mpsc::UnboundedSender;

/// Receives operator-facing events as the pipeline produces them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OperatorEvent);
}

pub struct ChannelEventSink {
    tx: UnboundedSender<OperatorEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: UnboundedSender<OperatorEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: OperatorEvent) {
        let _ = self.tx.send(event);
    }
}

/// Source of the instant a transcript is read at.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant; replays and tests pin "today" with it.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
