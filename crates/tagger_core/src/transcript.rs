use std::collections::BTreeMap;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::load_phrase::match_load_phrase;
use crate::time_info::{CivilDate, TimeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    Operator,
    Customer,
}

/// One message as read from the conversation pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: Author,
    pub text: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub time: Option<TimeInfo>,
}

/// Everything read from an open conversation, stamped with when it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub observed_at: DateTime<Tz>,
    pub messages: Vec<ChatMessage>,
}

/// A tracking link found in one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLink {
    pub url: String,
    pub time_info: TimeInfo,
    /// Position of the carrying message in the conversation.
    pub ordinal: usize,
}

/// Only ad-platform short links and post permalinks count as tracking links.
pub fn is_tracking_link(href: &str) -> bool {
    let Ok(url) = Url::parse(href.trim()) else {
        return false;
    };
    if url.scheme() != "https" {
        return false;
    }
    match url.host_str() {
        Some("fb.me") => true,
        Some(host) if host == "instagram.com" || host.ends_with(".instagram.com") => {
            url.path().starts_with("/p/")
        }
        _ => false,
    }
}

/// Metadata distilled from a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub today: CivilDate,
    /// Tracking links sent today, in conversation order.
    pub links: Vec<MetaLink>,
    pub first_message: Option<TimeInfo>,
    /// Name of the load phrase an operator message matched.
    pub load_phrase: Option<&'static str>,
}

impl Extraction {
    pub fn primary_link(&self) -> Option<&MetaLink> {
        self.links.first()
    }

    pub fn load_confirmed(&self) -> bool {
        self.load_phrase.is_some()
    }

    /// Timestamp the code's date is taken from.
    pub fn code_time(&self) -> Option<&TimeInfo> {
        self.primary_link()
            .map(|link| &link.time_info)
            .or(self.first_message.as_ref())
    }

    /// A chat is tagged when it has a link from today or started today.
    pub fn is_taggable(&self) -> bool {
        !self.links.is_empty()
            || self
                .first_message
                .as_ref()
                .is_some_and(|time| time.is_today(self.today))
    }

    /// Messages carrying each link, keyed by URL.
    pub fn link_counts(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for link in &self.links {
            *counts.entry(link.url.clone()).or_insert(0) += 1;
        }
        counts
    }
}

fn observed(time: &TimeInfo, now: DateTime<Tz>) -> TimeInfo {
    TimeInfo::observed(time.absolute_label.clone(), time.relative_label.clone(), now)
}

/// Collects today's tracking links, the first message's time and the load
/// confirmation from a transcript.
pub fn analyze(transcript: &Transcript) -> Extraction {
    let now = transcript.observed_at;
    let today = CivilDate::from_naive(now.date_naive());

    let mut links = Vec::new();
    for (ordinal, message) in transcript.messages.iter().enumerate() {
        let Some(time) = message.time.as_ref() else {
            continue;
        };
        let time = observed(time, now);
        if !time.is_today(today) {
            continue;
        }
        for href in message.links.iter().filter(|href| is_tracking_link(href)) {
            links.push(MetaLink {
                url: href.trim().to_string(),
                time_info: time.clone(),
                ordinal,
            });
        }
    }

    let first_message = transcript
        .messages
        .first()
        .and_then(|message| message.time.as_ref())
        .map(|time| observed(time, now));

    let load_phrase = transcript
        .messages
        .iter()
        .filter(|message| message.author == Author::Operator)
        .find_map(|message| match_load_phrase(&message.text));

    Extraction {
        today,
        links,
        first_message,
        load_phrase,
    }
}
