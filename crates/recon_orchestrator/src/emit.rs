//! The seam between the orchestrator and the approval service (§4.7 step 7, §4.8). Defined here
//! rather than in `recon_approval_client` so this crate can swap in a test double without the
//! approval client depending back on the orchestrator, mirroring how `recon_gl_cache` defines
//! `GlEntrySource` for `recon_approval_client::ApprovalServiceClient` to implement.

use async_trait::async_trait;
use recon_approval_client::{ApprovalClientError, ApprovalServiceClient, SubmitSuggestionRequest, SubmitSuggestionResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("suggestion submission failed: {0}")]
    Call(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Where a scored candidate's suggestion goes once C6 has picked a winner (§4.7 step 7).
#[async_trait]
pub trait SuggestionSink: Send + Sync {
    async fn submit(&self, request: &SubmitSuggestionRequest) -> SinkResult<SubmitSuggestionResponse>;
}

#[async_trait]
impl SuggestionSink for ApprovalServiceClient {
    async fn submit(&self, request: &SubmitSuggestionRequest) -> SinkResult<SubmitSuggestionResponse> {
        self.submit_suggestion(request).await.map_err(|e: ApprovalClientError| SinkError::Call(e.to_string()))
    }
}
