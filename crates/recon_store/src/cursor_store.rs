use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use recon_model::{CursorStatus, CurrencyCode, ProfileId, SyncCursor};

use crate::error::{StoreError, StoreResult};

pub type CursorKey = (ProfileId, CurrencyCode);

/// Repository contract for [`SyncCursor`] rows (§3, §4.2). The invariant "at most one `syncing`
/// row per (profile, currency)" is enforced by [`CursorStore::try_acquire`] being a single
/// atomic compare-and-swap rather than a read-then-write pair.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get_or_init(&self, key: CursorKey, make: SyncCursor) -> StoreResult<SyncCursor>;

    /// Atomically transition a non-syncing cursor to `Syncing` (§4.2 steps 1-2). Returns
    /// [`StoreError::AlreadySyncing`] if another worker already holds it.
    async fn try_acquire(&self, key: &CursorKey) -> StoreResult<SyncCursor>;

    /// Advance `last_end_date`, set `Idle`, bump `count` (§4.2 step 5).
    async fn complete(&self, key: &CursorKey, new_end_date: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<()>;

    /// Record a failure: `Error` status with a message, `last_end_date` unchanged so the next
    /// run retries the same window (§4.2 step 6).
    async fn fail(&self, key: &CursorKey, message: String) -> StoreResult<()>;

    async fn get(&self, key: &CursorKey) -> StoreResult<Option<SyncCursor>>;
}

#[derive(Default)]
pub struct InMemoryCursorStore {
    rows: DashMap<CursorKey, SyncCursor>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get_or_init(&self, key: CursorKey, make: SyncCursor) -> StoreResult<SyncCursor> {
        Ok(self.rows.entry(key).or_insert(make).clone())
    }

    async fn try_acquire(&self, key: &CursorKey) -> StoreResult<SyncCursor> {
        let mut entry = self
            .rows
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", key.0, key.1)))?;
        if entry.status == CursorStatus::Syncing {
            return Err(StoreError::AlreadySyncing(format!("{}/{}", key.0, key.1)));
        }
        entry.status = CursorStatus::Syncing;
        entry.error = None;
        Ok(entry.clone())
    }

    async fn complete(&self, key: &CursorKey, new_end_date: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<()> {
        let mut entry = self
            .rows
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", key.0, key.1)))?;
        entry.last_end_date = new_end_date;
        entry.last_synced_at = Some(now);
        entry.status = CursorStatus::Idle;
        entry.count += 1;
        Ok(())
    }

    async fn fail(&self, key: &CursorKey, message: String) -> StoreResult<()> {
        let mut entry = self
            .rows
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", key.0, key.1)))?;
        entry.status = CursorStatus::Error;
        entry.error = Some(message);
        Ok(())
    }

    async fn get(&self, key: &CursorKey) -> StoreResult<Option<SyncCursor>> {
        Ok(self.rows.get(key).map(|r| r.clone()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use recon_model::BalanceId;

    use super::*;

    fn key() -> CursorKey {
        (ProfileId::from("p-1"), "EUR".to_string())
    }

    #[tokio::test]
    async fn only_one_syncing_row_at_a_time() {
        let store = InMemoryCursorStore::new();
        let epoch = Utc::now();
        store
            .get_or_init(key(), SyncCursor::new(key().0, key().1, BalanceId::from("bal-1"), epoch))
            .await
            .unwrap();

        store.try_acquire(&key()).await.unwrap();
        let result = store.try_acquire(&key()).await;
        assert!(matches!(result, Err(StoreError::AlreadySyncing(_))));
    }

    #[tokio::test]
    async fn failure_preserves_last_end_date_for_retry() {
        let store = InMemoryCursorStore::new();
        let epoch = Utc::now();
        store
            .get_or_init(key(), SyncCursor::new(key().0, key().1, BalanceId::from("bal-1"), epoch))
            .await
            .unwrap();
        store.try_acquire(&key()).await.unwrap();
        store.fail(&key(), "network error".into()).await.unwrap();
        let cursor = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(cursor.status, CursorStatus::Error);
        assert_eq!(cursor.last_end_date, epoch);
        assert_eq!(cursor.error.as_deref(), Some("network error"));
    }

    #[tokio::test]
    async fn complete_advances_watermark_and_count() {
        let store = InMemoryCursorStore::new();
        let epoch = Utc::now();
        store
            .get_or_init(key(), SyncCursor::new(key().0, key().1, BalanceId::from("bal-1"), epoch))
            .await
            .unwrap();
        store.try_acquire(&key()).await.unwrap();
        let new_end = epoch + chrono::Duration::days(1);
        store.complete(&key(), new_end, new_end).await.unwrap();
        let cursor = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(cursor.status, CursorStatus::Idle);
        assert_eq!(cursor.last_end_date, new_end);
        assert_eq!(cursor.count, 1);
    }
}
