use std::path::Path;

use anyhow::{Context, Result};

use summarist_core::{
    entry::{reading_time_minutes, NewEntry},
    storage::{Database, EntryRepository},
};

pub async fn run(db: &Database, feed: &str, title: &str, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let repo = EntryRepository::new(db);
    let entry = repo
        .create(NewEntry {
            feed: feed.to_string(),
            title: title.to_string(),
            content,
        })
        .await?;

    println!("Added entry {} to '{}'", entry.id, feed);
    println!("Reading time: {} min", reading_time_minutes(&entry.content));

    Ok(())
}
