//! Orchestrator (C7, §4.7): the per-entity batch pipeline wiring ingestion's output through the
//! matcher cascade, pattern boosts, the confidence scorer, and out to the approval service.

pub mod batch;
pub mod emit;
pub mod error;

pub use batch::{BatchOutcome, Orchestrator};
pub use emit::{SinkError, SinkResult, SuggestionSink};
pub use error::{OrchestratorError, OrchestratorResult};
