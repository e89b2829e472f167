use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::EntryStore;
use crate::entry::{content_hash, Entry};
use crate::Result;

/// Entry store kept in process memory
#[derive(Default)]
pub struct MemoryEntryStore {
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, entry: Entry) {
        self.entries.write().await.insert(entry.id, entry);
    }

    /// All entries, oldest first
    pub async fn list(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }
}

#[async_trait::async_trait]
impl EntryStore for MemoryEntryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Entry>> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn replace_content(&self, id: Uuid, expected_hash: &str, content: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.hash == expected_hash => {
                entry.content = content.to_string();
                entry.hash = content_hash(content);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
