//! Tracking codes written into a conversation's notes field.
//!
//! A code reads `DD-MM-ID[LETTER][!]`. The `DD-MM-ID` part is the base and is
//! the merge key: a notes field holds at most one code per base, and a code
//! that carries the load-confirmed `!` never loses it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::panel::PanelRecord;
use crate::time_info::{CivilDate, TimeInfo};

/// Panel id used when the conversation's panel is not registered.
pub const UNKNOWN_PANEL_ID: u32 = 0;

static CODE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d+)([A-Za-z])?(!)?$").expect("static code pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a tracking code: {0:?}")]
pub struct CodeParseError(pub String);

/// The `DD-MM-ID` prefix of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Base {
    pub day: u32,
    pub month: u32,
    pub panel_id: u32,
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}-{}", self.day, self.month, self.panel_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NomenclatureCode {
    pub base: Base,
    pub letter: Option<char>,
    pub load_confirmed: bool,
}

impl NomenclatureCode {
    /// Builds the code for one conversation.
    ///
    /// The date comes from the message's absolute label when it carries a
    /// `D/M/YYYY` date and falls back to the civil `today` otherwise.
    pub fn synthesize(
        panel: Option<&PanelRecord>,
        time: Option<&TimeInfo>,
        today: CivilDate,
        letter: Option<char>,
        load_confirmed: bool,
    ) -> Self {
        let date = time.and_then(TimeInfo::absolute_date).unwrap_or(today);
        Self {
            base: Base {
                day: date.day,
                month: date.month,
                panel_id: panel.map_or(UNKNOWN_PANEL_ID, |panel| panel.id),
            },
            letter: letter.map(|l| l.to_ascii_uppercase()),
            load_confirmed,
        }
    }

    /// Combines an existing code with a newer one for the same base.
    ///
    /// The newer letter wins when present, an existing letter is kept when
    /// the newer code has none, and `!` is sticky.
    pub fn absorb(&self, newer: &NomenclatureCode) -> NomenclatureCode {
        NomenclatureCode {
            base: self.base,
            letter: newer.letter.or(self.letter),
            load_confirmed: self.load_confirmed || newer.load_confirmed,
        }
    }
}

impl fmt::Display for NomenclatureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(letter) = self.letter {
            write!(f, "{letter}")?;
        }
        if self.load_confirmed {
            f.write_str("!")?;
        }
        Ok(())
    }
}

impl FromStr for NomenclatureCode {
    type Err = CodeParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || CodeParseError(raw.to_string());
        let caps = CODE_SHAPE.captures(raw.trim()).ok_or_else(invalid)?;
        let number = |idx: usize| -> Result<u32, CodeParseError> {
            caps.get(idx)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(invalid)
        };
        Ok(Self {
            base: Base {
                day: number(1)?,
                month: number(2)?,
                panel_id: number(3)?,
            },
            letter: caps
                .get(4)
                .and_then(|m| m.as_str().chars().next())
                .map(|l| l.to_ascii_uppercase()),
            load_confirmed: caps.get(5).is_some(),
        })
    }
}

/// One comma-separated entry of the notes field.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Code { raw: String, code: NomenclatureCode },
    /// Free text the operators typed; kept verbatim and never deduplicated.
    Other(String),
}

impl Entry {
    fn parse(raw: &str) -> Self {
        match raw.parse::<NomenclatureCode>() {
            Ok(code) => Entry::Code {
                raw: raw.to_string(),
                code,
            },
            Err(_) => Entry::Other(raw.to_string()),
        }
    }

    fn from_code(code: NomenclatureCode) -> Self {
        Entry::Code {
            raw: code.to_string(),
            code,
        }
    }

    fn raw(&self) -> &str {
        match self {
            Entry::Code { raw, .. } | Entry::Other(raw) => raw,
        }
    }

    fn code(&self) -> Option<&NomenclatureCode> {
        match self {
            Entry::Code { code, .. } => Some(code),
            Entry::Other(_) => None,
        }
    }
}

/// Ordered list of entries attached to one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodeSet {
    entries: Vec<Entry>,
}

impl CodeSet {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Entry::parse)
            .collect();
        Self { entries }
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(Entry::raw)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn codes(&self) -> impl Iterator<Item = &NomenclatureCode> {
        self.entries.iter().filter_map(Entry::code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn raws(&self) -> Vec<&str> {
        self.entries.iter().map(Entry::raw).collect()
    }

    fn position_of(&self, base: Base) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.code().is_some_and(|code| code.base == base))
    }

    fn upsert(&mut self, incoming: &NomenclatureCode) {
        match self.position_of(incoming.base) {
            None => self.entries.push(Entry::from_code(*incoming)),
            Some(idx) => {
                let Entry::Code { raw, code } = &self.entries[idx] else {
                    return;
                };
                let merged = code.absorb(incoming);
                if merged.to_string() != *raw {
                    self.entries[idx] = Entry::from_code(merged);
                }
            }
        }
    }

    /// Collapses entries that still share a base, e.g. stale data written
    /// before the merge rules existed. The longer spelling survives and
    /// inherits a `!` from the one it replaces.
    fn dedup_bases(&mut self) {
        let mut kept: Vec<Entry> = Vec::with_capacity(self.entries.len());
        let mut by_base: HashMap<Base, usize> = HashMap::new();
        for entry in self.entries.drain(..) {
            let Some(code) = entry.code().copied() else {
                kept.push(entry);
                continue;
            };
            match by_base.get(&code.base) {
                None => {
                    by_base.insert(code.base, kept.len());
                    kept.push(entry);
                }
                Some(&idx) => {
                    let current = &kept[idx];
                    let (primary, other) = if entry.raw().len() > current.raw().len() {
                        (entry.clone(), current.clone())
                    } else {
                        (current.clone(), entry.clone())
                    };
                    kept[idx] = inherit_load(primary, &other);
                }
            }
        }
        self.entries = kept;
    }
}

fn inherit_load(primary: Entry, other: &Entry) -> Entry {
    let primary_code = primary.code().copied();
    match (primary_code, other.code()) {
        (Some(mut code), Some(other_code)) if other_code.load_confirmed && !code.load_confirmed => {
            code.load_confirmed = true;
            Entry::from_code(code)
        }
        _ => primary,
    }
}

/// Result of folding freshly synthesized codes into a notes field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub codes: CodeSet,
    /// True when the notes field must be rewritten.
    pub changed: bool,
}

impl MergeOutcome {
    pub fn text(&self) -> String {
        self.codes.render()
    }
}

/// Merges `incoming` codes into the current notes text.
pub fn merge_codes(existing: &str, incoming: &[NomenclatureCode]) -> MergeOutcome {
    let original = CodeSet::parse(existing);
    let mut codes = original.clone();
    for code in incoming {
        codes.upsert(code);
    }
    codes.dedup_bases();
    let changed = codes.raws() != original.raws();
    MergeOutcome { codes, changed }
}
