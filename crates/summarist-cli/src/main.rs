use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use summarist_core::{storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "summarist")]
#[command(author, version, about = "AI summaries for feed entries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this configuration file instead of the default one
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert HTML to Markdown (reads stdin when no file is given)
    Convert {
        file: Option<PathBuf>,
    },
    /// Store an HTML file as a feed entry
    Add {
        /// Feed the entry belongs to
        #[arg(short, long)]
        feed: String,
        #[arg(short, long)]
        title: String,
        /// HTML file with the entry body
        file: PathBuf,
    },
    /// List stored entries
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
    /// Print an entry's content
    Show {
        id: Uuid,
        /// Render with summarize triggers pointing at this URL
        #[arg(long)]
        trigger_url: Option<String>,
    },
    /// Stream a summary for one entry into the terminal
    Summarize {
        id: Uuid,
    },
    /// Summarize eligible unsummarized entries once
    Batch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Logs go to stderr so converted output can be piped
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Commands::Convert { file } = &cli.command {
        return commands::convert::run(file.as_deref());
    }

    let db = Database::new(&config).await?;

    match cli.command {
        Commands::Convert { .. } => Ok(()),
        Commands::Add { feed, title, file } => commands::add::run(&db, &feed, &title, &file).await,
        Commands::List { limit } => commands::list::run(&db, &config, limit).await,
        Commands::Show { id, trigger_url } => commands::show::run(&db, id, trigger_url.as_deref()).await,
        Commands::Summarize { id } => commands::summarize::run(db, &config, id).await,
        Commands::Batch => commands::batch::run(&db, &config).await,
    }
}
