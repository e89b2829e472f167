use anyhow::Result;

use summarist_core::{
    entry::{is_eligible, reading_time_minutes},
    storage::{Database, EntryRepository},
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig, limit: u32) -> Result<()> {
    let entries = EntryRepository::new(db).list(limit).await?;

    if entries.is_empty() {
        println!("No entries yet.");
        println!("\nTo add one, run:");
        println!("  summarist add --feed <feed> --title <title> <file.html>");
        return Ok(());
    }

    println!("Entries ({}):\n", entries.len());

    for entry in &entries {
        let status = if entry.is_summarized() {
            " [summarized]"
        } else if is_eligible(entry, &config.batch) {
            " [eligible]"
        } else {
            ""
        };

        println!("  {} - {}{}", entry.id, entry.title, status);
        println!(
            "    Feed: {}, {} min read, added {}",
            entry.feed,
            reading_time_minutes(&entry.content),
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
        println!();
    }

    Ok(())
}
