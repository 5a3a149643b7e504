//! Client for the downstream approval service (C8): suggestion submission, status reads,
//! pattern CRUD, and enrichment delivery (§4.8). Also implements [`recon_gl_cache::GlEntrySource`]
//! so `recon_gl_cache::GlFetcher` can sit in front of its `get_gl_entries` call without the
//! cache crate depending back on this one's HTTP plumbing.

pub mod client;
pub mod error;
pub mod types;

pub use client::ApprovalServiceClient;
pub use error::{ApprovalClientError, ApprovalClientResult};
pub use types::{
    EnrichmentData, EnrichmentRequest, GlEntryWire, ListSuggestionsResponse, PatternWire,
    SubmitBatchRequest, SubmitBatchResponse, SubmitSuggestionRequest, SubmitSuggestionResponse,
    SuggestionDetail, SuggestionStatus,
};
