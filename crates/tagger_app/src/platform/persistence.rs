use std::path::{Path, PathBuf};

use tagger_engine::{read_state_file, AtomicFileWriter, CollectedMetrics, PersistError};
use tagger_logging::{tagger_error, tagger_info, tagger_warn};

use super::replay::SavedNotes;

const METRICS_FILENAME: &str = "metrics.ron";

/// Metrics saved by earlier runs; empty when absent or unreadable.
pub(crate) fn load_metrics(state_dir: &Path) -> CollectedMetrics {
    let content = match read_state_file(state_dir, METRICS_FILENAME) {
        Ok(Some(text)) => text,
        Ok(None) => return CollectedMetrics::new(),
        Err(err) => {
            tagger_warn!("Failed to read metrics from {:?}: {}", state_dir, err);
            return CollectedMetrics::new();
        }
    };

    match ron::from_str(&content) {
        Ok(metrics) => {
            tagger_info!("Loaded collected metrics from {:?}", state_dir);
            metrics
        }
        Err(err) => {
            tagger_warn!("Failed to parse metrics in {:?}: {}", state_dir, err);
            CollectedMetrics::new()
        }
    }
}

/// Folds this run's counts into the saved ledger and writes it back.
pub(crate) fn save_metrics(state_dir: &Path, run: &CollectedMetrics) {
    let mut metrics = load_metrics(state_dir);
    metrics.absorb(run.clone());
    if let Err(err) = write_ron(state_dir, METRICS_FILENAME, &metrics) {
        tagger_error!("Failed to write metrics to {:?}: {}", state_dir, err);
    }
}

pub(crate) fn save_notes(target: &Path, notes: &[SavedNotes]) -> Result<PathBuf, PersistError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PersistError::StateDir(format!("not a file path: {}", target.display())))?;
    write_ron(&dir, filename, &notes)
}

fn write_ron<T: serde::Serialize>(
    dir: &Path,
    filename: &str,
    value: &T,
) -> Result<PathBuf, PersistError> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(value, pretty).map_err(|err| PersistError::Encode {
        what: filename.to_string(),
        message: err.to_string(),
    })?;
    AtomicFileWriter::new(dir.to_path_buf()).write(filename, &content)
}
