use std::path::Path;

use rand::Rng;
use tagger_logging::tagger_info;

use crate::persist::{read_state_file, AtomicFileWriter, PersistError};

const MACHINE_ID_FILE: &str = "machine_id";
const SUFFIX_LEN: usize = 9;

/// Builds an id of the form `MACHINE-<unix millis>-<9 base36 chars>`.
pub fn generate_machine_id(now_millis: i64, rng: &mut impl Rng) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .filter_map(|_| char::from_digit(rng.gen_range(0..36), 36))
        .collect();
    format!("MACHINE-{now_millis}-{suffix}")
}

/// Returns the id stored in `dir`, generating and persisting one on first use.
pub fn load_or_create_machine_id(dir: &Path) -> Result<String, PersistError> {
    if let Some(existing) = read_state_file(dir, MACHINE_ID_FILE)? {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }
    let id = generate_machine_id(
        chrono::Utc::now().timestamp_millis(),
        &mut rand::thread_rng(),
    );
    AtomicFileWriter::new(dir.to_path_buf()).write(MACHINE_ID_FILE, &id)?;
    tagger_info!("generated machine id {id}");
    Ok(id)
}
