mod database;
mod entry_repo;
mod memory;
pub mod retry;

pub use database::Database;
pub use entry_repo::EntryRepository;
pub use memory::MemoryEntryStore;

use uuid::Uuid;

use crate::entry::Entry;
use crate::Result;

/// Host-side entry storage the summary pipeline reads from and writes to
#[async_trait::async_trait]
pub trait EntryStore: Send + Sync {
    /// Load an entry by id
    async fn find(&self, id: Uuid) -> Result<Option<Entry>>;

    /// Replace an entry's content in a single write.
    ///
    /// The write only happens while the stored content hash still equals
    /// `expected_hash`; returns whether it happened.
    async fn replace_content(&self, id: Uuid, expected_hash: &str, content: &str) -> Result<bool>;
}
