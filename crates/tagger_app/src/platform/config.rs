use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use serde::Deserialize;
use tagger_core::PanelRecord;
use tagger_engine::{PipelineSettings, RemoteSettings, ResolverSettings};

/// Contents of the optional RON configuration file. Every field falls back
/// to its default when omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineSettings,
    pub resolver: ResolverSettings,
    /// Remote registry, mapping store and alert relay. Absent means offline.
    pub remote: Option<RemoteSettings>,
    /// Consulted after the registry when matching a panel label.
    pub fallback_panels: Vec<PanelRecord>,
    /// IANA name of the civil timezone "today" is computed in.
    pub timezone: Option<String>,
    /// Machine id and collected metrics live here.
    pub state_dir: PathBuf,
    /// Load every known mapping before the first batch.
    pub warm_cache: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            resolver: ResolverSettings::default(),
            remote: None,
            fallback_panels: Vec::new(),
            timezone: None,
            state_dir: PathBuf::from(".tagger"),
            warm_cache: true,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse_config(content: &str) -> anyhow::Result<AppConfig> {
    let mut config: AppConfig = ron::from_str(content)?;
    if let Some(name) = config.timezone.as_deref() {
        let tz: Tz = name
            .parse()
            .map_err(|err| anyhow!("unknown timezone {name:?}: {err}"))?;
        config.pipeline.timezone = tz;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tagger_core::CIVIL_TIMEZONE;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("()").unwrap();
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert!(config.remote.is_none());
        assert!(config.warm_cache);
        assert_eq!(config.pipeline.timezone, CIVIL_TIMEZONE);
    }

    #[test]
    fn overrides_are_applied() {
        let config = parse_config(
            r#"(
                pipeline: (batch_cap: 10, between_chats: 1200),
                resolver: (max_polls: 20),
                remote: Some((
                    registry_base_url: "https://panels.example.com",
                    mappings_base_url: "https://maps.example.com",
                    secret: "s3cret",
                )),
                fallback_panels: [(id: 10, name: "Goatgaming", phone_numbers: ["5491100000000"])],
                timezone: Some("Europe/Madrid"),
                warm_cache: false,
            )"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.batch_cap, 10);
        assert_eq!(config.pipeline.between_chats, Duration::from_millis(1200));
        assert_eq!(config.pipeline.batch_delay, Duration::from_millis(3000));
        assert_eq!(config.resolver.max_polls, 20);
        assert_eq!(config.resolver.poll_interval, Duration::from_secs(3));
        let remote = config.remote.unwrap();
        assert_eq!(remote.secret, "s3cret");
        assert_eq!(remote.panel_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.fallback_panels[0].name, "Goatgaming");
        assert_eq!(config.pipeline.timezone, chrono_tz::Europe::Madrid);
        assert!(!config.warm_cache);
    }

    #[test]
    fn shipped_config_parses() {
        let config = parse_config(include_str!("../../../../demos/tagger.ron")).unwrap();
        assert_eq!(config.fallback_panels.len(), 3);
        assert_eq!(config.pipeline.timezone, CIVIL_TIMEZONE);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        assert!(parse_config(r#"(timezone: Some("Mars/Olympus"))"#).is_err());
    }
}
