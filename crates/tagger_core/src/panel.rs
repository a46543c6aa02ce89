use serde::{Deserialize, Serialize};

/// Shortest registry name allowed to match by containment.
const MIN_PARTIAL_MATCH_LEN: usize = 4;

/// A registered traffic source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
}

impl PanelRecord {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            phone_numbers: Vec::new(),
        }
    }

    pub fn with_numbers(mut self, numbers: Vec<String>) -> Self {
        self.phone_numbers = numbers;
        self
    }

    /// Number reported to the alert sink: the first registered one.
    pub fn primary_number(&self) -> &str {
        self.phone_numbers.first().map(String::as_str).unwrap_or("")
    }
}

/// Strips the decoration the assignment widget wraps around a panel name:
/// `"Panel Lisboa Añade"` becomes `"Lisboa"`.
pub fn clean_panel_label(raw: &str) -> String {
    let mut label = raw.trim();
    for prefix in ["Panel ", "panel "] {
        if let Some(rest) = label.strip_prefix(prefix) {
            label = rest.trim_start();
        }
    }
    for suffix in [" Añade", " Cambiar"] {
        if let Some(rest) = label.strip_suffix(suffix) {
            label = rest.trim_end();
        }
    }
    label.to_string()
}

/// Finds the panel a cleaned label refers to.
///
/// Exact case-insensitive matches win; otherwise a registry name contained in
/// the label matches, provided it is long enough to not be a false positive
/// (`"Escaloneta"` must not resolve to `"Scalo"` the other way round).
pub fn match_panel<'a>(label: &str, panels: &'a [PanelRecord]) -> Option<&'a PanelRecord> {
    let wanted = label.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    panels
        .iter()
        .find(|panel| panel.name.to_lowercase() == wanted)
        .or_else(|| {
            panels.iter().find(|panel| {
                let name = panel.name.to_lowercase();
                name.chars().count() >= MIN_PARTIAL_MATCH_LEN && wanted.contains(&name)
            })
        })
}

/// Resolves a label against the remote registry first, then a local fallback table.
pub fn resolve_panel(
    label: &str,
    registry: &[PanelRecord],
    fallback: &[PanelRecord],
) -> Option<PanelRecord> {
    let cleaned = clean_panel_label(label);
    match_panel(&cleaned, registry)
        .or_else(|| match_panel(&cleaned, fallback))
        .cloned()
}
