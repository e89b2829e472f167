pub mod providers;
pub mod retry;
mod session;
mod summarizer;
pub mod transport;

pub use providers::{ProviderKind, StreamDecoder, SummaryProvider};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use session::{FailureKind, SaveStatus, SessionOutcome, SessionState, SummarySession, SummarySurface};
pub use summarizer::Summarizer;
pub use transport::{ChunkStream, HttpTransport, SummaryRequest, Transport};
