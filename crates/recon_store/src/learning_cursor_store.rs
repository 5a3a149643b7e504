use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use recon_model::SuggestionId;
use std::sync::Mutex;

use crate::error::StoreResult;

/// Poll-cursor state for the learning loop (C9, §4.9): the high-water mark on `reviewed_at`
/// plus the dedup set of `(suggestion_id, reviewed_at)` pairs already folded into a pattern, so
/// a suggestion reviewed at exactly the current watermark is never double-counted even though
/// the next poll's query is inclusive of that timestamp (§4.9 "processes each suggestion id
/// exactly once, keyed by (suggestion_id, reviewed_at)").
#[async_trait]
pub trait LearningCursorStore: Send + Sync {
    /// The `reviewed_since` value to pass on the next poll. `None` before the first successful
    /// poll, meaning "fetch the full backlog".
    async fn watermark(&self) -> StoreResult<Option<DateTime<Utc>>>;

    async fn is_processed(&self, suggestion_id: &SuggestionId, reviewed_at: DateTime<Utc>) -> StoreResult<bool>;

    /// Record a suggestion as processed and advance the watermark to `max(current, reviewed_at)`.
    async fn mark_processed(&self, suggestion_id: &SuggestionId, reviewed_at: DateTime<Utc>) -> StoreResult<()>;
}

#[derive(Default)]
pub struct InMemoryLearningCursorStore {
    watermark: Mutex<Option<DateTime<Utc>>>,
    processed: DashSet<(String, DateTime<Utc>)>,
}

impl InMemoryLearningCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearningCursorStore for InMemoryLearningCursorStore {
    async fn watermark(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(*self.watermark.lock().expect("learning cursor lock poisoned"))
    }

    async fn is_processed(&self, suggestion_id: &SuggestionId, reviewed_at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.processed.contains(&(suggestion_id.as_str().to_string(), reviewed_at)))
    }

    async fn mark_processed(&self, suggestion_id: &SuggestionId, reviewed_at: DateTime<Utc>) -> StoreResult<()> {
        self.processed.insert((suggestion_id.as_str().to_string(), reviewed_at));
        let mut watermark = self.watermark.lock().expect("learning cursor lock poisoned");
        if watermark.map(|w| reviewed_at > w).unwrap_or(true) {
            *watermark = Some(reviewed_at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn watermark_advances_to_the_maximum_reviewed_at_seen() {
        let store = InMemoryLearningCursorStore::new();
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(30);
        store.mark_processed(&SuggestionId::from("s-2"), t2).await.unwrap();
        store.mark_processed(&SuggestionId::from("s-1"), t1).await.unwrap();
        assert_eq!(store.watermark().await.unwrap(), Some(t2));
    }

    #[tokio::test]
    async fn same_suggestion_and_reviewed_at_is_processed_exactly_once() {
        let store = InMemoryLearningCursorStore::new();
        let id = SuggestionId::from("s-1");
        let at = Utc::now();
        assert!(!store.is_processed(&id, at).await.unwrap());
        store.mark_processed(&id, at).await.unwrap();
        assert!(store.is_processed(&id, at).await.unwrap());
    }
}
