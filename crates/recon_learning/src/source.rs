//! The seam between the learning loop and the approval service (§4.9 step 0), mirroring how
//! `recon_orchestrator::emit` defines `SuggestionSink` for the same client rather than having
//! `recon_approval_client` depend back on this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_approval_client::{ApprovalServiceClient, SuggestionDetail};

use crate::error::{LearningError, LearningResult};

/// Where the learning loop reads reviewed suggestions from (§4.9 "polls for suggestions whose
/// status transitioned ... since the last poll cursor").
#[async_trait]
pub trait ReviewedSuggestionSource: Send + Sync {
    async fn list_reviewed_since(&self, since: Option<DateTime<Utc>>) -> LearningResult<Vec<SuggestionDetail>>;
}

#[async_trait]
impl ReviewedSuggestionSource for ApprovalServiceClient {
    async fn list_reviewed_since(&self, since: Option<DateTime<Utc>>) -> LearningResult<Vec<SuggestionDetail>> {
        self.list_reviewed_suggestions(since).await.map_err(|e| LearningError::Source(e.to_string()))
    }
}
