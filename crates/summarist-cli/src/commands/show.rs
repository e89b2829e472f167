use anyhow::{anyhow, Result};
use uuid::Uuid;

use summarist_core::{
    entry::render_trigger,
    storage::{Database, EntryRepository},
};

pub async fn run(db: &Database, id: Uuid, trigger_url: Option<&str>) -> Result<()> {
    let entry = EntryRepository::new(db)
        .find_by_id(id)
        .await?
        .ok_or_else(|| anyhow!("no entry with id {}", id))?;

    match trigger_url {
        Some(url) => println!("{}", render_trigger(&entry, url)),
        None => println!("{}", entry.content),
    }

    Ok(())
}
