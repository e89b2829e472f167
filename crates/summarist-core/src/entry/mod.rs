mod block;
mod eligibility;
mod models;
mod persist;

pub use block::{has_summary, render_trigger, SummaryBlock, SUMMARY_END_MARKER, SUMMARY_START_MARKER};
pub use eligibility::{is_eligible, reading_time_minutes, word_count};
pub use models::{content_hash, Entry, NewEntry};
pub use persist::{decode_summary, persist, PersistOutcome};
