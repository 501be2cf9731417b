//! Release notes knowledge and answering.
//!
//! Provides the chunk index, question retrieval, grounded answer synthesis,
//! the confidence guard, conversation sessions and the escalation and
//! contact ledgers.

pub mod config;
pub mod contact;
pub mod embeddings;
pub mod escalation;
pub mod index;
pub mod ingest;
pub mod rag;
pub mod retriever;
pub mod session;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use contact::{parse_contact_line, validate_contact, ContactDetails, ContactLedger};
pub use escalation::{EscalationSink, JsonlLedger, MemorySink};
pub use index::{ChunkIndex, MemoryIndex, SqliteIndex};
pub use ingest::{ingest, stats, IngestOptions};
pub use rag::{AnswerPipeline, AnswerResponse, Citation, ReasonCode};
pub use retriever::Retriever;
pub use session::{ConversationTurn, SessionStore, TurnOutcome};
pub use types::{Chunk, IndexStats, IngestStats, ReleaseNoteBlock, RetrievalResult, ScoredChunk};
