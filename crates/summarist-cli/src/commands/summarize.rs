use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use uuid::Uuid;

use summarist_core::{
    ai::{SaveStatus, SessionOutcome, SessionState, Summarizer, SummarySession, SummarySurface},
    storage::Database,
    AppConfig,
};

/// Prints the summary as it grows, writing only what was not shown yet
#[derive(Default)]
struct TerminalSurface {
    shown: Mutex<usize>,
}

impl SummarySurface for TerminalSurface {
    fn on_state(&self, state: &SessionState) {
        match state {
            SessionState::Loading => eprintln!("Requesting summary..."),
            SessionState::Error(kind) => eprintln!("\n{}", kind.message()),
            _ => {}
        }
    }

    fn render(&self, summary: &str) {
        let mut shown = self.shown.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delta) = summary.get(*shown..) {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
        *shown = summary.len();
    }

    fn on_saved(&self, status: &SaveStatus) {
        match status {
            SaveStatus::Inserted => eprintln!("\n\nSummary saved."),
            SaveStatus::AlreadyPresent => eprintln!("\n\nEntry already had a summary; not saved."),
            SaveStatus::Skipped => eprintln!("\nEmpty summary; nothing saved."),
            SaveStatus::Failed(e) => eprintln!("\n\nFailed to save summary: {}", e),
        }
    }
}

pub async fn run(db: Database, config: &AppConfig, id: Uuid) -> Result<()> {
    let summarizer = Arc::new(Summarizer::new(config)?);
    let session = SummarySession::new(
        id,
        summarizer,
        Arc::new(db),
        Arc::new(TerminalSurface::default()),
    );

    match session.trigger().await {
        SessionOutcome::Completed { .. } => Ok(()),
        SessionOutcome::AlreadySummarized => {
            println!("Entry {} is already summarized.", id);
            Ok(())
        }
        SessionOutcome::Rejected => bail!("a summary request is already running"),
        SessionOutcome::Failed(kind) => bail!("{}", kind.message()),
    }
}
