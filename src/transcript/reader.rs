use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::warn;

use super::entry::TranscriptEntry;

/// Stream-parse a transcript file, skipping blank and malformed lines.
/// One corrupt line never invalidates the rest of the log.
pub fn read_entries(path: &Path) -> io::Result<Vec<TranscriptEntry>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping malformed transcript line: {}", e),
        }
    }

    Ok(entries)
}
