use async_trait::async_trait;
use dashmap::DashMap;
use recon_model::{BankTransaction, ProfileId, Reference, TxStatus};

use crate::error::{StoreError, StoreResult};

/// Repository contract for [`BankTransaction`] rows (§3, §4.2, §4.13). Required indices per §6:
/// `(entity, occurred_at)`, `(status)`, `(profile_id, occurred_at)` — the in-memory implementation
/// below satisfies the same query shapes a durable index-backed store would, by linear scan.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Upsert by `reference` (§4.2 step 4): insert if absent; if present, update mutable fields
    /// only when they differ, and never regress `status` or `attempts`.
    async fn upsert(&self, incoming: BankTransaction) -> StoreResult<()>;

    async fn get(&self, reference: &Reference) -> StoreResult<Option<BankTransaction>>;

    /// Replace the row with `updated`, used by the orchestrator after a scoring attempt. Fails
    /// if the row doesn't exist yet.
    async fn put(&self, updated: BankTransaction) -> StoreResult<()>;

    /// Select rows with `status = pending`, ordered by `occurred_at` ascending, capped at `limit`
    /// (§4.7 step 1).
    async fn select_pending(&self, limit: usize) -> StoreResult<Vec<BankTransaction>>;

    async fn list_by_profile(&self, profile_id: &ProfileId) -> StoreResult<Vec<BankTransaction>>;

    async fn count_by_status(&self, status: TxStatus) -> StoreResult<usize>;
}

/// In-memory [`TransactionStore`], the reference double used by unit/integration tests and the
/// only implementation this port ships (see DESIGN.md).
#[derive(Default)]
pub struct InMemoryTransactionStore {
    rows: DashMap<Reference, BankTransaction>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn upsert(&self, incoming: BankTransaction) -> StoreResult<()> {
        match self.rows.get_mut(&incoming.reference) {
            None => {
                self.rows.insert(incoming.reference.clone(), incoming);
            }
            Some(mut existing) => {
                if mutable_fields_differ(&existing, &incoming) {
                    existing.description = incoming.description;
                    existing.running_balance = incoming.running_balance;
                    existing.fees = incoming.fees;
                    existing.card = incoming.card;
                    existing.fx = incoming.fx;
                }
                // status/attempts/best_confidence/suggestion_id are owned by C7 from here on;
                // ingestion never regresses them (§4.2 step 4 invariant).
            }
        }
        Ok(())
    }

    async fn get(&self, reference: &Reference) -> StoreResult<Option<BankTransaction>> {
        Ok(self.rows.get(reference).map(|r| r.clone()))
    }

    async fn put(&self, updated: BankTransaction) -> StoreResult<()> {
        if !self.rows.contains_key(&updated.reference) {
            return Err(StoreError::NotFound(updated.reference.to_string()));
        }
        self.rows.insert(updated.reference.clone(), updated);
        Ok(())
    }

    async fn select_pending(&self, limit: usize) -> StoreResult<Vec<BankTransaction>> {
        let mut pending: Vec<BankTransaction> = self
            .rows
            .iter()
            .filter(|r| r.status == TxStatus::Pending)
            .map(|r| r.clone())
            .collect();
        pending.sort_by_key(|t| t.occurred_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn list_by_profile(&self, profile_id: &ProfileId) -> StoreResult<Vec<BankTransaction>> {
        Ok(self.rows.iter().filter(|r| &r.profile_id == profile_id).map(|r| r.clone()).collect())
    }

    async fn count_by_status(&self, status: TxStatus) -> StoreResult<usize> {
        Ok(self.rows.iter().filter(|r| r.status == status).count())
    }
}

fn mutable_fields_differ(existing: &BankTransaction, incoming: &BankTransaction) -> bool {
    existing.description != incoming.description
        || existing.running_balance != incoming.running_balance
        || existing.fees != incoming.fees
        || existing.card != incoming.card
        || existing.fx != incoming.fx
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use recon_model::{CardInfo, Direction, Money, TransactionKind};

    use super::*;

    fn tx(reference: &str, occurred_at: chrono::DateTime<Utc>) -> BankTransaction {
        BankTransaction {
            reference: reference.into(),
            entity: "Phygrid Limited".into(),
            profile_id: "p-1".into(),
            direction: Direction::Credit,
            kind: TransactionKind::Transfer,
            occurred_at,
            amount: Money::new(1000, 2),
            currency: "EUR".into(),
            description: "desc".into(),
            payment_reference: None,
            counterparty_name: None,
            counterparty_account: None,
            fx: None,
            fees: Money::ZERO,
            card: None,
            running_balance: Money::ZERO,
            status: TxStatus::Pending,
            last_attempt_at: None,
            attempts: 0,
            best_confidence: 0.0,
            suggestion_id: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_reference() {
        let store = InMemoryTransactionStore::new();
        let now = Utc::now();
        store.upsert(tx("REF-1", now)).await.unwrap();
        store.upsert(tx("REF-1", now)).await.unwrap();
        assert_eq!(store.count_by_status(TxStatus::Pending).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_never_regresses_status_or_attempts() {
        let store = InMemoryTransactionStore::new();
        let now = Utc::now();
        let mut submitted = tx("REF-2", now);
        submitted.status = TxStatus::Submitted;
        submitted.attempts = 3;
        store.upsert(submitted).await.unwrap();

        // Replaying ingestion for the same reference must not revert status/attempts.
        store.upsert(tx("REF-2", now)).await.unwrap();
        let row = store.get(&"REF-2".into()).await.unwrap().unwrap();
        assert_eq!(row.status, TxStatus::Submitted);
        assert_eq!(row.attempts, 3);
    }

    #[tokio::test]
    async fn upsert_updates_mutable_fields_on_change() {
        let store = InMemoryTransactionStore::new();
        let now = Utc::now();
        store.upsert(tx("REF-3", now)).await.unwrap();
        let mut updated = tx("REF-3", now);
        updated.description = "updated desc".into();
        updated.card = Some(CardInfo { merchant: Some("Shop".into()), ..Default::default() });
        store.upsert(updated).await.unwrap();
        let row = store.get(&"REF-3".into()).await.unwrap().unwrap();
        assert_eq!(row.description, "updated desc");
        assert_eq!(row.card.unwrap().merchant.as_deref(), Some("Shop"));
    }

    #[tokio::test]
    async fn select_pending_orders_by_occurred_at_and_caps() {
        let store = InMemoryTransactionStore::new();
        let base = Utc::now();
        store.upsert(tx("LATE", base + chrono::Duration::days(2))).await.unwrap();
        store.upsert(tx("EARLY", base)).await.unwrap();
        store.upsert(tx("MID", base + chrono::Duration::days(1))).await.unwrap();

        let page = store.select_pending(2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].reference.as_str(), "EARLY");
        assert_eq!(page[1].reference.as_str(), "MID");
    }
}
