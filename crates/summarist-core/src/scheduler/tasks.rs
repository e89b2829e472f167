use std::fmt;

use crate::ai::Summarizer;
use crate::config::BatchConfig;
use crate::entry::{is_eligible, persist, Entry};
use crate::markdown::html_to_markdown;
use crate::storage::{Database, EntryRepository, EntryStore};
use crate::Result;

/// Counts from one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Eligible candidates handled before the run ended; ineligible ones are not counted
    pub processed: u32,
    pub summarized: u32,
    pub failed: u32,
    pub skipped_ineligible: u32,
    pub skipped_existing: u32,
    /// The success limit was hit with candidates left over
    pub stopped_early: bool,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {}, summarized {}, failed {}, ineligible {}, already summarized {}{}",
            self.processed,
            self.summarized,
            self.failed,
            self.skipped_ineligible,
            self.skipped_existing,
            if self.stopped_early { " (limit reached)" } else { "" }
        )
    }
}

/// Summarize eligible candidates one at a time with non-streamed requests.
///
/// Per-entry failures are logged and counted; only a configuration problem
/// fails the run, and it does so before any entry is touched.
pub async fn summarize_eligible_entries(
    summarizer: &Summarizer,
    store: &dyn EntryStore,
    config: &BatchConfig,
    candidates: Vec<Entry>,
) -> Result<BatchReport> {
    summarizer.ensure_configured()?;

    let timeout = config.request_timeout();
    let mut report = BatchReport::default();

    for entry in candidates {
        if report.summarized >= config.max_summaries_per_run {
            report.stopped_early = true;
            break;
        }

        if !is_eligible(&entry, config) {
            report.skipped_ineligible += 1;
            continue;
        }
        report.processed += 1;

        if entry.is_summarized() {
            report.skipped_existing += 1;
            continue;
        }

        let markdown = html_to_markdown(&entry.content);
        let summary = match summarizer.summarize(&markdown, timeout).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(entry = %entry.id, title = %entry.title, error = %e, "Failed to summarize entry");
                report.failed += 1;
                continue;
            }
        };

        match persist(store, entry.id, &summary).await {
            Ok(outcome) if outcome.inserted => {
                tracing::debug!(entry = %entry.id, title = %entry.title, "Summarized entry");
                report.summarized += 1;
            }
            Ok(_) => report.skipped_existing += 1,
            Err(e) => {
                tracing::warn!(entry = %entry.id, title = %entry.title, error = %e, "Failed to save summary");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        processed = report.processed,
        summarized = report.summarized,
        failed = report.failed,
        skipped_ineligible = report.skipped_ineligible,
        skipped_existing = report.skipped_existing,
        stopped_early = report.stopped_early,
        "Batch summary run finished"
    );

    Ok(report)
}

/// Run a batch over the most recent unsummarized entries in the database
pub async fn summarize_pending_entries(
    db: &Database,
    summarizer: &Summarizer,
    config: &BatchConfig,
) -> Result<BatchReport> {
    let candidates = EntryRepository::new(db)
        .list_unsummarized(config.max_entries_per_run)
        .await?;

    summarize_eligible_entries(summarizer, db, config, candidates).await
}
