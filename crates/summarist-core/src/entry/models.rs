use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::block::has_summary;

/// A feed entry as seen by the summary pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    /// Name of the feed the entry belongs to
    pub feed: String,
    pub title: String,
    /// Entry body as HTML
    pub content: String,
    /// Hex SHA-256 of `content`, used for compare-and-swap writes
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new entry
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub feed: String,
    pub title: String,
    pub content: String,
}

impl Entry {
    pub fn new(feed: &str, title: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            feed: feed.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            hash: content_hash(content),
            created_at: Utc::now(),
        }
    }

    /// Check if the entry already carries a summary block
    pub fn is_summarized(&self) -> bool {
        has_summary(&self.content)
    }
}

impl From<NewEntry> for Entry {
    fn from(new: NewEntry) -> Self {
        Entry::new(&new.feed, &new.title, &new.content)
    }
}

pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
