//! Session transcript persistence.
//!
//! Newline-delimited JSON, one self-contained record per line. The transcript
//! is the single source of truth for session progress: the monitor
//! reconstructs its counters by replaying it.

mod entry;
mod reader;
mod writer;

pub use entry::{ActionDetails, ActionName, AiDetails, HumanDetails, PromptDetails, TranscriptEntry};
pub use reader::read_entries;
pub use writer::TranscriptWriter;
