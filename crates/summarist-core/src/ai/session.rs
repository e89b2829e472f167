//! Interactive, streamed summary acquisition for a single entry
//!
//! A session moves `Idle -> Loading -> Streaming -> Finished`, or into
//! `Error` from Loading or Streaming. Finished, Error and Idle all accept a
//! new trigger; Loading and Streaming reject one.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use super::providers::StreamDecoder;
use super::retry::retry_with_backoff;
use super::summarizer::Summarizer;
use super::transport::ChunkStream;
use crate::entry::{persist, PersistOutcome};
use crate::markdown::html_to_markdown;
use crate::storage::EntryStore;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A required provider setting is missing
    NotConfigured,
    /// The request could not be opened, or the response broke off
    RequestFailed,
}

impl FailureKind {
    /// Fixed text shown to the user
    pub fn message(self) -> &'static str {
        match self {
            FailureKind::NotConfigured => "AI summary is not configured",
            FailureKind::RequestFailed => "Request Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Streaming,
    Finished,
    Error(FailureKind),
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Loading | SessionState::Streaming)
    }
}

/// What became of the summary after it was displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Inserted,
    AlreadyPresent,
    /// The provider produced no text
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A request was already in flight
    Rejected,
    /// The entry carries a summary block; nothing was requested
    AlreadySummarized,
    Completed { summary: String, saved: SaveStatus },
    Failed(FailureKind),
}

/// Where a session shows its progress
pub trait SummarySurface: Send + Sync {
    fn on_state(&self, state: &SessionState);

    /// Called with the whole summary received so far, never a delta
    fn render(&self, summary: &str);

    fn on_saved(&self, _status: &SaveStatus) {}
}

type OpenedStream = (Box<dyn ChunkStream>, Box<dyn StreamDecoder>);

/// Summary session bound to one entry and one display surface
pub struct SummarySession {
    entry_id: Uuid,
    summarizer: Arc<Summarizer>,
    store: Arc<dyn EntryStore>,
    surface: Arc<dyn SummarySurface>,
    state: watch::Sender<SessionState>,
}

impl SummarySession {
    pub fn new(
        entry_id: Uuid,
        summarizer: Arc<Summarizer>,
        store: Arc<dyn EntryStore>,
        surface: Arc<dyn SummarySurface>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            entry_id,
            summarizer,
            store,
            surface,
            state,
        }
    }

    pub fn entry_id(&self) -> Uuid {
        self.entry_id
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Request, stream and save a summary for the entry
    pub async fn trigger(&self) -> SessionOutcome {
        let started = self.state.send_if_modified(|state| {
            if state.is_busy() {
                false
            } else {
                *state = SessionState::Loading;
                true
            }
        });

        if !started {
            tracing::debug!(entry = %self.entry_id, "Summary already in progress, ignoring trigger");
            return SessionOutcome::Rejected;
        }
        self.surface.on_state(&SessionState::Loading);

        if let Err(e) = self.summarizer.ensure_configured() {
            return self.fail(e);
        }

        let opened = retry_with_backoff(self.summarizer.retry_policy(), || self.open()).await;
        let (mut stream, mut decoder) = match opened {
            Ok(Some(opened)) => opened,
            Ok(None) => {
                tracing::debug!(entry = %self.entry_id, "Entry already summarized");
                self.set_state(SessionState::Idle);
                return SessionOutcome::AlreadySummarized;
            }
            Err(e) => return self.fail(e),
        };

        self.set_state(SessionState::Streaming);

        let mut summary = String::new();
        if let Err(e) = self.read_stream(stream.as_mut(), decoder.as_mut(), &mut summary).await {
            return self.fail(e);
        }

        self.set_state(SessionState::Finished);

        let saved = self.save(&summary).await;
        self.surface.on_saved(&saved);

        SessionOutcome::Completed { summary, saved }
    }

    /// Everything up to an open 2xx response; retried as a unit
    async fn open(&self) -> Result<Option<OpenedStream>> {
        let entry = self
            .store
            .find(self.entry_id)
            .await?
            .ok_or_else(|| Error::EntryNotFound(self.entry_id.to_string()))?;

        if entry.is_summarized() {
            return Ok(None);
        }

        let markdown = html_to_markdown(&entry.content);
        self.summarizer.open_stream(&markdown).await.map(Some)
    }

    async fn read_stream(
        &self,
        stream: &mut dyn ChunkStream,
        decoder: &mut dyn StreamDecoder,
        summary: &mut String,
    ) -> Result<()> {
        while let Some(chunk) = stream.next_chunk().await? {
            let fragments = decoder.push(&chunk)?;
            if !fragments.is_empty() {
                summary.extend(fragments);
                self.surface.render(summary);
            }
        }

        let rest = decoder.finish()?;
        if !rest.is_empty() {
            summary.extend(rest);
            self.surface.render(summary);
        }

        Ok(())
    }

    async fn save(&self, summary: &str) -> SaveStatus {
        match persist(self.store.as_ref(), self.entry_id, summary).await {
            Ok(PersistOutcome { inserted: true }) => SaveStatus::Inserted,
            Ok(PersistOutcome { inserted: false }) => SaveStatus::AlreadyPresent,
            Err(Error::EmptySummary) => {
                tracing::debug!(entry = %self.entry_id, "Empty summary, nothing saved");
                SaveStatus::Skipped
            }
            Err(e) => {
                tracing::warn!(entry = %self.entry_id, error = %e, "Failed to save summary");
                SaveStatus::Failed(e.to_string())
            }
        }
    }

    fn fail(&self, error: Error) -> SessionOutcome {
        let kind = match error {
            Error::Config(_) => FailureKind::NotConfigured,
            _ => FailureKind::RequestFailed,
        };
        tracing::warn!(entry = %self.entry_id, error = %error, "Summary request failed");
        self.set_state(SessionState::Error(kind));
        SessionOutcome::Failed(kind)
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state.clone());
        self.surface.on_state(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::ProviderKind;
    use crate::ai::transport::{SummaryRequest, Transport};
    use crate::config::AppConfig;
    use crate::entry::{Entry, SummaryBlock, SUMMARY_START_MARKER};
    use crate::storage::MemoryEntryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails the first `failures` sends, then serves `chunks`
    struct ScriptedTransport {
        sends: AtomicU32,
        failures: u32,
        status: Option<u16>,
        delay: Duration,
        chunks: Vec<&'static str>,
        requests: Mutex<Vec<SummaryRequest>>,
    }

    impl ScriptedTransport {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                sends: AtomicU32::new(0),
                failures: 0,
                status: None,
                delay: Duration::ZERO,
                chunks,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn sends(&self) -> u32 {
            self.sends.load(Ordering::SeqCst)
        }
    }

    struct ScriptedStream(VecDeque<Bytes>);

    #[async_trait]
    impl ChunkStream for ScriptedStream {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
            Ok(self.0.pop_front())
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &SummaryRequest, _timeout: Option<Duration>) -> Result<Box<dyn ChunkStream>> {
            let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
            self.requests.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if n <= self.failures {
                return Err(Error::Transport("connection refused".to_string()));
            }
            if let Some(status) = self.status {
                return Err(Error::Status {
                    status,
                    body: "server error".to_string(),
                });
            }
            let chunks = self.chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect();
            Ok(Box::new(ScriptedStream(chunks)))
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        states: Mutex<Vec<SessionState>>,
        renders: Mutex<Vec<String>>,
        saved: Mutex<Option<SaveStatus>>,
    }

    impl SummarySurface for RecordingSurface {
        fn on_state(&self, state: &SessionState) {
            self.states.lock().unwrap().push(state.clone());
        }

        fn render(&self, summary: &str) {
            self.renders.lock().unwrap().push(summary.to_string());
        }

        fn on_saved(&self, status: &SaveStatus) {
            *self.saved.lock().unwrap() = Some(status.clone());
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.provider.provider = ProviderKind::Ollama;
        config.provider.base_url = "http://localhost:11434".to_string();
        config.provider.api_key = "key".to_string();
        config.provider.model = "llama3".to_string();
        config.provider.system_prompt = "Summarize.".to_string();
        config
    }

    struct Fixture {
        session: SummarySession,
        store: Arc<MemoryEntryStore>,
        transport: Arc<ScriptedTransport>,
        surface: Arc<RecordingSurface>,
        entry_id: Uuid,
    }

    async fn fixture(config: AppConfig, content: &str, transport: ScriptedTransport) -> Fixture {
        let store = Arc::new(MemoryEntryStore::new());
        let entry = Entry::new("tech", "Title", content);
        let entry_id = entry.id;
        store.insert(entry).await;

        let transport = Arc::new(transport);
        let surface = Arc::new(RecordingSurface::default());
        let summarizer = Arc::new(Summarizer::with_transport(&config, transport.clone()));
        let session = SummarySession::new(entry_id, summarizer, store.clone(), surface.clone());

        Fixture {
            session,
            store,
            transport,
            surface,
            entry_id,
        }
    }

    #[tokio::test]
    async fn test_streams_and_saves() {
        let f = fixture(
            config(),
            "<p>Hello <b>world</b></p>",
            ScriptedTransport::new(vec!["{\"response\":\"Hel\"}\n", "{\"respo", "nse\":\"lo\"}\n"]),
        )
        .await;

        let outcome = f.session.trigger().await;

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                summary: "Hello".to_string(),
                saved: SaveStatus::Inserted
            }
        );
        assert_eq!(*f.surface.renders.lock().unwrap(), vec!["Hel", "Hello"]);
        assert_eq!(
            *f.surface.states.lock().unwrap(),
            vec![SessionState::Loading, SessionState::Streaming, SessionState::Finished]
        );
        assert_eq!(*f.surface.saved.lock().unwrap(), Some(SaveStatus::Inserted));
        assert_eq!(f.session.state(), SessionState::Finished);

        let request = f.transport.requests.lock().unwrap()[0].clone();
        assert_eq!(request.url, "http://localhost:11434/api/generate");
        assert_eq!(request.body["prompt"], "Hello **world**\n\n");
        assert_eq!(request.body["stream"], true);

        let content = f.store.find(f.entry_id).await.unwrap().unwrap().content;
        assert!(content.starts_with(SUMMARY_START_MARKER));
        assert!(content.contains("Hello"));
    }

    #[tokio::test]
    async fn test_chat_stream_accumulates_and_saves() {
        let mut config = config();
        config.provider.provider = ProviderKind::OpenAi;
        config.provider.base_url = "https://api.openai.com/v1/".to_string();
        let f = fixture(
            config,
            "<p>Hello <b>world</b></p>",
            ScriptedTransport::new(vec![
                "{\"choices\":[{\"message\":{\"content\":\"Rust \"}}]}",
                "{\"choices\":[{\"message\":{\"con",
                "tent\":\"is &amp; \"}}]}{\"choices\":[{\"message\":{\"content\":\"fast.\"}}]}",
            ]),
        )
        .await;

        let outcome = f.session.trigger().await;

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                summary: "Rust is &amp; fast.".to_string(),
                saved: SaveStatus::Inserted
            }
        );
        assert_eq!(
            *f.surface.renders.lock().unwrap(),
            vec!["Rust ", "Rust is &amp; fast."]
        );
        assert_eq!(
            *f.surface.states.lock().unwrap(),
            vec![SessionState::Loading, SessionState::Streaming, SessionState::Finished]
        );

        let request = f.transport.requests.lock().unwrap()[0].clone();
        assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(request.body["messages"][1]["content"], "Hello **world**\n\n");
        assert_eq!(request.body["stream"], true);

        let content = f.store.find(f.entry_id).await.unwrap().unwrap().content;
        assert!(content.starts_with(SUMMARY_START_MARKER));
        assert!(content.contains("Rust is & fast."));
        assert!(content.ends_with("<p>Hello <b>world</b></p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let mut transport = ScriptedTransport::new(vec!["{\"response\":\"ok\"}\n"]);
        transport.failures = 2;
        let f = fixture(config(), "<p>text</p>", transport).await;

        let start = tokio::time::Instant::now();
        let outcome = f.session.trigger().await;

        assert!(matches!(outcome, SessionOutcome::Completed { .. }));
        assert_eq!(f.transport.sends(), 3);
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let mut transport = ScriptedTransport::new(vec![]);
        transport.failures = 10;
        let f = fixture(config(), "<p>text</p>", transport).await;

        let outcome = f.session.trigger().await;

        assert_eq!(outcome, SessionOutcome::Failed(FailureKind::RequestFailed));
        assert_eq!(f.transport.sends(), 3);
        assert_eq!(f.session.state(), SessionState::Error(FailureKind::RequestFailed));
        assert_eq!(FailureKind::RequestFailed.message(), "Request Failed");
        assert!(!f.store.find(f.entry_id).await.unwrap().unwrap().is_summarized());
    }

    #[tokio::test]
    async fn test_status_error_is_not_retried() {
        let mut transport = ScriptedTransport::new(vec![]);
        transport.status = Some(500);
        let f = fixture(config(), "<p>text</p>", transport).await;

        let outcome = f.session.trigger().await;

        assert_eq!(outcome, SessionOutcome::Failed(FailureKind::RequestFailed));
        assert_eq!(f.transport.sends(), 1);
        assert!(f.surface.renders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_stream_fails_without_saving() {
        let mut config = config();
        config.provider.provider = ProviderKind::OpenAi;
        let f = fixture(
            config,
            "<p>text</p>",
            ScriptedTransport::new(vec!["{\"choices\":[{\"message\":{\"content\":\"par\"}}]}", "garbage"]),
        )
        .await;

        let outcome = f.session.trigger().await;

        assert_eq!(outcome, SessionOutcome::Failed(FailureKind::RequestFailed));
        assert_eq!(*f.surface.renders.lock().unwrap(), vec!["par"]);
        assert!(!f.store.find(f.entry_id).await.unwrap().unwrap().is_summarized());
    }

    #[tokio::test]
    async fn test_not_configured() {
        let mut config = config();
        config.provider.api_key = " ".to_string();
        let f = fixture(config, "<p>text</p>", ScriptedTransport::new(vec![])).await;

        let outcome = f.session.trigger().await;

        assert_eq!(outcome, SessionOutcome::Failed(FailureKind::NotConfigured));
        assert_eq!(f.transport.sends(), 0);
        assert_eq!(f.session.state(), SessionState::Error(FailureKind::NotConfigured));
    }

    #[tokio::test]
    async fn test_already_summarized_entry() {
        let content = SummaryBlock::new("done").prepend_to("<p>text</p>");
        let f = fixture(config(), &content, ScriptedTransport::new(vec![])).await;

        assert_eq!(f.session.trigger().await, SessionOutcome::AlreadySummarized);
        assert_eq!(f.transport.sends(), 0);
        assert_eq!(f.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_empty_summary_is_skipped() {
        let f = fixture(
            config(),
            "<p>text</p>",
            ScriptedTransport::new(vec!["{\"response\":\"\",\"done\":true}\n"]),
        )
        .await;

        let outcome = f.session.trigger().await;

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                summary: String::new(),
                saved: SaveStatus::Skipped
            }
        );
        assert!(!f.store.find(f.entry_id).await.unwrap().unwrap().is_summarized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_while_busy_is_rejected() {
        let mut transport = ScriptedTransport::new(vec!["{\"response\":\"x\"}\n"]);
        transport.delay = Duration::from_millis(10);
        let f = fixture(config(), "<p>text</p>", transport).await;

        let (first, second) = tokio::join!(f.session.trigger(), f.session.trigger());

        assert!(matches!(first, SessionOutcome::Completed { .. }));
        assert_eq!(second, SessionOutcome::Rejected);
        assert_eq!(f.transport.sends(), 1);
    }

    #[tokio::test]
    async fn test_trigger_again_after_failure() {
        let mut transport = ScriptedTransport::new(vec![]);
        transport.status = Some(503);
        let f = fixture(config(), "<p>text</p>", transport).await;
        let mut states = f.session.subscribe();

        assert!(matches!(f.session.trigger().await, SessionOutcome::Failed(_)));
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Error(FailureKind::RequestFailed));

        assert!(matches!(f.session.trigger().await, SessionOutcome::Failed(_)));
        assert_eq!(f.transport.sends(), 2);
    }
}
