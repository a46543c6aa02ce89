use std::collections::HashSet;

/// Text the inbox shows once the monitored account has been locked.
pub const LOCKOUT_MARKER: &str = "business account locked";

pub fn contains_lockout(pane_text: &str) -> bool {
    pane_text.to_lowercase().contains(LOCKOUT_MARKER)
}

/// Identifies one outage occurrence: a panel seen locked in one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutageKey {
    pub panel_id: u32,
    pub occurrence: String,
}

/// Outages already reported during the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutageLedger {
    reported: HashSet<OutageKey>,
}

impl OutageLedger {
    /// Returns true the first time a key is seen.
    pub fn record(&mut self, key: OutageKey) -> bool {
        self.reported.insert(key)
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    pub fn clear(&mut self) {
        self.reported.clear();
    }
}
