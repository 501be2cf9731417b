//! Retrieval-augmented answering.
//!
//! Context assembly, grounded synthesis, the confidence guard and the
//! pipeline that ties them to retrieval and sessions.

pub mod context;
pub mod guard;
pub mod parse;
pub mod pipeline;
pub mod synthesize;
pub mod types;

pub use context::assemble;
pub use guard::{GuardPolicy, GuardRule};
pub use pipeline::{AnswerPipeline, PipelineSettings};
pub use synthesize::{SynthesisSettings, Synthesizer};
pub use types::{
    Answer, AnswerResponse, Citation, CitedPassage, EscalationRecord, GroundingContext,
    GuardDecision, ReasonCode, SynthesisOutcome,
};
