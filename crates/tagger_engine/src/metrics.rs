use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tagger_core::NomenclatureCode;

/// How many messages carried each tracking URL, per code written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedMetrics {
    codes: BTreeMap<String, BTreeMap<String, u32>>,
}

impl CollectedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, code: &NomenclatureCode, counts: &BTreeMap<String, u32>) {
        let per_url = self.codes.entry(code.to_string()).or_default();
        for (url, count) in counts {
            *per_url.entry(url.clone()).or_insert(0) += count;
        }
    }

    pub fn count(&self, code: &str, url: &str) -> u32 {
        self.codes
            .get(code)
            .and_then(|per_url| per_url.get(url))
            .copied()
            .unwrap_or(0)
    }

    pub fn codes(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, u32>)> {
        self.codes
            .iter()
            .map(|(code, per_url)| (code.as_str(), per_url))
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Folds a previously saved ledger into this one.
    pub fn absorb(&mut self, other: CollectedMetrics) {
        for (code, per_url) in other.codes {
            let target = self.codes.entry(code).or_default();
            for (url, count) in per_url {
                *target.entry(url).or_insert(0) += count;
            }
        }
    }
}
