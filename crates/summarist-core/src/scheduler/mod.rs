pub mod tasks;

pub use tasks::{summarize_eligible_entries, summarize_pending_entries, BatchReport};
