use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::retry::with_retry;
use super::Database;
use crate::entry::{content_hash, Entry, NewEntry, SUMMARY_START_MARKER};
use crate::Result;

/// Repository for entry CRUD operations
pub struct EntryRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct EntryRow {
    id: String,
    feed: String,
    title: String,
    content: String,
    hash: String,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            feed: row.feed,
            title: row.title,
            content: row.content,
            hash: row.hash,
            created_at: row.created_at,
        }
    }
}

impl<'a> EntryRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_entry: NewEntry) -> Result<Entry> {
        let entry = Entry::from(new_entry);
        let pool = self.db.pool().clone();

        with_retry(|| {
            let pool = pool.clone();
            let entry = entry.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO entries (id, feed, title, content, hash, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(entry.id.to_string())
                .bind(&entry.feed)
                .bind(&entry.title)
                .bind(&entry.content)
                .bind(&entry.hash)
                .bind(entry.created_at)
                .execute(&pool)
                .await
                .map(|_| ())
            }
        })
        .await?;

        Ok(entry)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Entry>> {
        let pool = self.db.pool().clone();
        let id = id.to_string();

        let row: Option<EntryRow> = with_retry(|| {
            let pool = pool.clone();
            let id = id.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT id, feed, title, content, hash, created_at
                    FROM entries
                    WHERE id = ?
                    "#,
                )
                .bind(id)
                .fetch_optional(&pool)
                .await
            }
        })
        .await?;

        Ok(row.map(Entry::from))
    }

    /// Most recent entries first
    pub async fn list(&self, limit: u32) -> Result<Vec<Entry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, feed, title, content, hash, created_at
            FROM entries
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    /// Entries without a summary block, most recent first
    pub async fn list_unsummarized(&self, limit: u32) -> Result<Vec<Entry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, feed, title, content, hash, created_at
            FROM entries
            WHERE instr(content, ?) = 0
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(SUMMARY_START_MARKER)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    /// Compare-and-swap update of an entry's content
    pub async fn replace_content(&self, id: Uuid, expected_hash: &str, content: &str) -> Result<bool> {
        let pool = self.db.pool().clone();
        let id = id.to_string();
        let expected_hash = expected_hash.to_string();
        let content = content.to_string();
        let new_hash = content_hash(&content);

        let rows = with_retry(|| {
            let pool = pool.clone();
            let id = id.clone();
            let expected_hash = expected_hash.clone();
            let content = content.clone();
            let new_hash = new_hash.clone();
            async move {
                sqlx::query(
                    r#"
                    UPDATE entries
                    SET content = ?, hash = ?
                    WHERE id = ? AND hash = ?
                    "#,
                )
                .bind(content)
                .bind(new_hash)
                .bind(id)
                .bind(expected_hash)
                .execute(&pool)
                .await
                .map(|r| r.rows_affected())
            }
        })
        .await?;

        Ok(rows > 0)
    }
}
