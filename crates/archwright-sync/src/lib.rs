//! Keeps a chat transcript and an architecture canvas in step with a
//! language model, and runs the course lifecycle built on top of it.

pub mod conversation;
pub mod course;
pub mod engine;
pub mod merge;
pub mod parse;
pub mod payload;
pub mod prompt;
pub mod retrieval;

#[cfg(test)]
mod testing;

pub use conversation::{
    load_history, AdvanceOutcome, Canvas, Collaborators, Conversation, DiagramUpdate, GraphSlot,
    GraphUpdate, RetrievalScope, SyncError, FALLBACK_REPLY,
};
pub use course::{CourseService, LifecycleError, ProgressReport, StepSession, StepSummary};
pub use engine::{CollaboratorError, LlmModelClient, ModelClient, ModelRequest};
pub use merge::{merge, MergeDiagnostic, MergeError, MergeOptions, MergeOutcome};
pub use parse::{parse_plan, parse_reply, ParsedReply, PlanParseError};
pub use payload::{PartialGraph, Payload, PayloadError, PayloadMode};
pub use retrieval::{DirectoryRetriever, Retriever};
