use async_trait::async_trait;
use dashmap::DashMap;
use recon_model::{Pattern, PatternId, PatternKind, TargetKind};

use crate::error::StoreResult;

/// Repository contract for persisted [`Pattern`] rows (§3, §4.9, §4.13). Uniqueness on
/// `(kind, value, target_kind)` is enforced by [`PatternStore::upsert`] rather than at the
/// database layer only, so the in-memory double and any durable backend share one semantics.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Insert a new pattern, or return the existing row if one already exists for the same
    /// uniqueness tuple (§8 "Pattern uniqueness": submitting the tuple twice yields one row).
    async fn upsert_new(&self, pattern: Pattern) -> StoreResult<Pattern>;

    async fn find_by_key(
        &self,
        kind: PatternKind,
        value: &str,
        target_kind: TargetKind,
    ) -> StoreResult<Option<Pattern>>;

    async fn get(&self, id: &PatternId) -> StoreResult<Option<Pattern>>;

    async fn put(&self, pattern: Pattern) -> StoreResult<()>;

    async fn list_active(&self) -> StoreResult<Vec<Pattern>>;
}

#[derive(Default)]
pub struct InMemoryPatternStore {
    rows: DashMap<PatternId, Pattern>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn upsert_new(&self, pattern: Pattern) -> StoreResult<Pattern> {
        if let Some(existing) =
            self.find_by_key(pattern.kind, &pattern.value, pattern.target_kind).await?
        {
            return Ok(existing);
        }
        let id = pattern.id;
        self.rows.insert(id, pattern);
        Ok(self.rows.get(&id).map(|r| r.clone()).expect("just inserted"))
    }

    async fn find_by_key(
        &self,
        kind: PatternKind,
        value: &str,
        target_kind: TargetKind,
    ) -> StoreResult<Option<Pattern>> {
        Ok(self
            .rows
            .iter()
            .find(|r| r.kind == kind && r.value == value && r.target_kind == target_kind)
            .map(|r| r.clone()))
    }

    async fn get(&self, id: &PatternId) -> StoreResult<Option<Pattern>> {
        Ok(self.rows.get(id).map(|r| r.clone()))
    }

    async fn put(&self, pattern: Pattern) -> StoreResult<()> {
        self.rows.insert(pattern.id, pattern);
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<Pattern>> {
        Ok(self.rows.iter().filter(|r| r.active).map(|r| r.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn upsert_new_is_a_no_op_on_uniqueness_collision() {
        let store = InMemoryPatternStore::new();
        let p1 = Pattern::new(
            PatternKind::Counterparty,
            "ombori ag".into(),
            TargetKind::Subsidiary,
            "sub-1".into(),
            "Ombori AG".into(),
            Utc::now(),
        );
        let id1 = p1.id;
        let inserted = store.upsert_new(p1).await.unwrap();
        assert_eq!(inserted.id, id1);

        let p2 = Pattern::new(
            PatternKind::Counterparty,
            "ombori ag".into(),
            TargetKind::Subsidiary,
            "sub-1".into(),
            "Ombori AG".into(),
            Utc::now(),
        );
        let returned = store.upsert_new(p2).await.unwrap();
        assert_eq!(returned.id, id1, "duplicate uniqueness tuple must return the existing row");

        let all = store.list_active().await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
