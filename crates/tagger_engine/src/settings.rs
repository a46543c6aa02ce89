use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tagger_core::{CIVIL_TIMEZONE, DEFAULT_BATCH_CAP, DEFAULT_MAX_ATTEMPTS, DEFAULT_STABLE_SAMPLES};

/// A named retry budget: optional initial delay, then `attempts` polls spaced
/// by `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitBudget {
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    pub attempts: u32,
    #[serde(with = "millis")]
    pub interval: Duration,
}

impl WaitBudget {
    pub const fn new(initial_delay: Duration, attempts: u32, interval: Duration) -> Self {
        Self {
            initial_delay,
            attempts,
            interval,
        }
    }
}

/// Timing of the per-chat steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub batch_cap: usize,
    pub window_ready: WaitBudget,
    #[serde(with = "millis")]
    pub scroll_settle: Duration,
    pub scroll_stable_samples: u32,
    pub scroll_max_attempts: u32,
    #[serde(with = "millis")]
    pub post_scroll_settle: Duration,
    pub edit_button: WaitBudget,
    pub notes_field: WaitBudget,
    #[serde(with = "millis")]
    pub write_settle: Duration,
    #[serde(with = "millis")]
    pub between_chats: Duration,
    #[serde(with = "millis")]
    pub batch_delay: Duration,
    #[serde(skip, default = "civil_timezone")]
    pub timezone: Tz,
}

fn civil_timezone() -> Tz {
    CIVIL_TIMEZONE
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_cap: DEFAULT_BATCH_CAP,
            window_ready: WaitBudget::new(
                Duration::from_millis(3000),
                10,
                Duration::from_millis(500),
            ),
            scroll_settle: Duration::from_millis(50),
            scroll_stable_samples: DEFAULT_STABLE_SAMPLES,
            scroll_max_attempts: DEFAULT_MAX_ATTEMPTS,
            post_scroll_settle: Duration::from_millis(1500),
            edit_button: WaitBudget::new(Duration::ZERO, 5, Duration::from_millis(300)),
            notes_field: WaitBudget::new(Duration::ZERO, 10, Duration::from_millis(500)),
            write_settle: Duration::from_millis(500),
            between_chats: Duration::from_millis(800),
            batch_delay: Duration::from_millis(3000),
            timezone: CIVIL_TIMEZONE,
        }
    }
}

/// Polling and attention-cue cadence of the letter resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    pub max_polls: u32,
    #[serde(with = "millis")]
    pub attention_interval: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_polls: 300,
            attention_interval: Duration::from_secs(15),
        }
    }
}

/// Endpoints and HTTP limits for the remote stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Serves `/paneles/` and `/alerts`.
    pub registry_base_url: String,
    /// Serves `/mapeos`.
    pub mappings_base_url: String,
    pub secret: String,
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    #[serde(with = "millis")]
    pub panel_cache_ttl: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            registry_base_url: "http://127.0.0.1:8080".to_string(),
            mappings_base_url: "http://127.0.0.1:8080".to_string(),
            secret: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            panel_cache_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Durations are written as whole milliseconds in config files.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operating_constants() {
        let pipeline = PipelineSettings::default();
        assert_eq!(pipeline.batch_cap, 25);
        assert_eq!(pipeline.window_ready.attempts, 10);
        assert_eq!(pipeline.scroll_max_attempts, 50);
        assert_eq!(pipeline.between_chats, Duration::from_millis(800));

        let resolver = ResolverSettings::default();
        assert_eq!(resolver.poll_interval * resolver.max_polls, Duration::from_secs(900));
        assert_eq!(RemoteSettings::default().panel_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let parsed: ResolverSettings = serde_json::from_str(r#"{"max_polls": 5}"#).unwrap();
        assert_eq!(parsed.max_polls, 5);
        assert_eq!(parsed.poll_interval, Duration::from_secs(3));
    }
}
