use uuid::Uuid;

use super::block::{has_summary, SummaryBlock};
use crate::storage::EntryStore;
use crate::{Error, Result};

/// Writes attempted before giving up on an entry that keeps changing
const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    /// False when a summary block was already present
    pub inserted: bool,
}

/// Decode HTML entities the response layer may have left in a summary
pub fn decode_summary(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

/// Prepend a summary block to an entry, at most once.
///
/// The marker check and the write are repeated if the entry changed between
/// reading and writing, so a concurrent writer that inserted a block first
/// turns this call into a no-op.
pub async fn persist(
    store: &dyn EntryStore,
    entry_id: Uuid,
    raw_summary: &str,
) -> Result<PersistOutcome> {
    if raw_summary.trim().is_empty() {
        return Err(Error::EmptySummary);
    }

    let block = SummaryBlock::new(decode_summary(raw_summary));

    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let entry = store
            .find(entry_id)
            .await?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;

        if has_summary(&entry.content) {
            tracing::debug!(entry = %entry_id, "Summary already present, not saving");
            return Ok(PersistOutcome { inserted: false });
        }

        let updated = block.prepend_to(&entry.content);
        if store.replace_content(entry_id, &entry.hash, &updated).await? {
            tracing::info!(entry = %entry_id, "Summary saved to entry");
            return Ok(PersistOutcome { inserted: true });
        }

        tracing::debug!(entry = %entry_id, attempt, "Entry changed while saving summary, re-reading");
    }

    Err(Error::Conflict(format!(
        "entry {} kept changing while saving its summary",
        entry_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, SUMMARY_START_MARKER};
    use crate::storage::MemoryEntryStore;
    use std::sync::Arc;

    async fn store_with(content: &str) -> (MemoryEntryStore, Uuid) {
        let store = MemoryEntryStore::new();
        let entry = Entry::new("tech", "Title", content);
        let id = entry.id;
        store.insert(entry).await;
        (store, id)
    }

    #[tokio::test]
    async fn test_persist_twice_inserts_once() {
        let (store, id) = store_with("<p>article</p>").await;

        let first = persist(&store, id, "A summary").await.unwrap();
        let second = persist(&store, id, "Another summary").await.unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);

        let content = store.find(id).await.unwrap().unwrap().content;
        assert_eq!(content.matches(SUMMARY_START_MARKER).count(), 1);
        assert!(content.contains("A summary"));
        assert!(!content.contains("Another summary"));
        assert!(content.ends_with("<p>article</p>"));
    }

    #[tokio::test]
    async fn test_entities_are_decoded() {
        let (store, id) = store_with("<p>x</p>").await;
        persist(&store, id, "Tom &amp; Jerry &lt;3 &quot;cats&quot; &hellip;")
            .await
            .unwrap();

        let content = store.find(id).await.unwrap().unwrap().content;
        assert!(content.contains("Tom & Jerry <3 \"cats\" …"));
    }

    #[tokio::test]
    async fn test_concurrent_persist_inserts_once() {
        let (store, id) = store_with("<p>article</p>").await;
        let store = Arc::new(store);

        let (a, b) = tokio::join!(
            persist(store.as_ref(), id, "top"),
            persist(store.as_ref(), id, "bottom")
        );

        let inserted = [a.unwrap(), b.unwrap()].iter().filter(|o| o.inserted).count();
        assert_eq!(inserted, 1);

        let content = store.find(id).await.unwrap().unwrap().content;
        assert_eq!(content.matches(SUMMARY_START_MARKER).count(), 1);
    }

    #[tokio::test]
    async fn test_missing_entry_and_empty_summary() {
        let store = MemoryEntryStore::new();
        assert!(matches!(
            persist(&store, Uuid::new_v4(), "text").await,
            Err(Error::EntryNotFound(_))
        ));

        let (store, id) = store_with("<p>x</p>").await;
        assert!(matches!(persist(&store, id, "  \n").await, Err(Error::EmptySummary)));
        assert!(!store.find(id).await.unwrap().unwrap().is_summarized());
    }
}
