use anyhow::Result;

use summarist_core::{
    ai::Summarizer,
    scheduler::summarize_pending_entries,
    storage::Database,
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig) -> Result<()> {
    println!("Summarizing eligible entries...\n");

    let summarizer = Summarizer::new(config)?;
    let report = summarize_pending_entries(db, &summarizer, &config.batch).await?;

    println!("\nBatch complete: {}", report);

    Ok(())
}
