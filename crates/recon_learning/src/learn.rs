//! The learning loop proper (C9, §4.9): turn reviewed suggestions into new or reinforced
//! patterns, with poisoning resistance against repeated rejections.

use std::sync::Arc;

use recon_approval_client::{SuggestionDetail, SuggestionStatus};
use recon_model::{Pattern, PatternId, Reference, TargetKind, TxStatus};
use recon_patterns::{Embedder, VectorIndex};
use recon_store::{LearningCursorStore, PatternStore, TransactionStore};
use recon_time::SharedClock;
use tracing::{debug, info, warn};

use crate::error::LearningResult;
use crate::mapping;
use crate::source::ReviewedSuggestionSource;

/// Similarity bar for "this reviewed suggestion is the same learned correspondence as an
/// existing pattern" (§4.9 step 2). Deliberately stricter than [`recon_patterns::SIMILARITY_MIN`]
/// (0.85, the bar for *applying* a boost): reusing a pattern row needs higher confidence than
/// merely nudging a score.
pub const DEDUPE_SIMILARITY_MIN: f64 = 0.95;

/// Tallies one [`LearningLoop::poll`] call, for scheduler/metrics reporting (§4.12).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LearningOutcome {
    pub scanned: usize,
    pub patterns_created: usize,
    pub patterns_reinforced: usize,
    pub rejections_applied: usize,
    pub promoted: usize,
    pub deactivated: usize,
    pub skipped_unreviewable: usize,
}

/// Wires the approval service's reviewed-suggestion feed into C5's pattern store and vector
/// index (§4.9).
pub struct LearningLoop {
    source: Arc<dyn ReviewedSuggestionSource>,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    patterns: Arc<dyn PatternStore>,
    cursor: Arc<dyn LearningCursorStore>,
    transactions: Arc<dyn TransactionStore>,
    clock: SharedClock,
}

impl LearningLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ReviewedSuggestionSource>,
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        patterns: Arc<dyn PatternStore>,
        cursor: Arc<dyn LearningCursorStore>,
        transactions: Arc<dyn TransactionStore>,
        clock: SharedClock,
    ) -> Self {
        Self { source, embedder, index, patterns, cursor, transactions, clock }
    }

    /// Run one poll cycle (§4.9): fetch everything reviewed since the cursor, fold each
    /// unprocessed suggestion into the pattern store, then mark it processed regardless of
    /// outcome so a suggestion this loop can't derive a pattern from is never retried forever.
    pub async fn poll(&self) -> LearningResult<LearningOutcome> {
        let since = self.cursor.watermark().await?;
        let reviewed = self.source.list_reviewed_since(since).await?;
        let mut outcome = LearningOutcome::default();

        for detail in reviewed {
            outcome.scanned += 1;
            let Some(reviewed_at) = detail.reviewed_at else {
                debug!(suggestion_id = %detail.id, "reviewed suggestion has no reviewed_at, skipping");
                outcome.skipped_unreviewable += 1;
                continue;
            };
            if self.cursor.is_processed(&detail.id, reviewed_at).await? {
                continue;
            }

            match detail.status {
                SuggestionStatus::Approved | SuggestionStatus::AutoApproved => {
                    self.apply_approval(&detail, &mut outcome).await?;
                    self.transition_transaction(&detail, TxStatus::Matched).await?;
                }
                SuggestionStatus::Rejected => {
                    self.apply_rejection(&detail, &mut outcome).await?;
                    self.transition_transaction(&detail, TxStatus::Unmatched).await?;
                }
                SuggestionStatus::Pending => {
                    outcome.skipped_unreviewable += 1;
                }
            }

            self.cursor.mark_processed(&detail.id, reviewed_at).await?;
        }

        info!(
            scanned = outcome.scanned,
            created = outcome.patterns_created,
            reinforced = outcome.patterns_reinforced,
            rejections = outcome.rejections_applied,
            promoted = outcome.promoted,
            deactivated = outcome.deactivated,
            "learning loop poll complete"
        );
        Ok(outcome)
    }

    async fn apply_approval(&self, detail: &SuggestionDetail, outcome: &mut LearningOutcome) -> LearningResult<()> {
        let Some(derived) = mapping::derive(detail) else {
            outcome.skipped_unreviewable += 1;
            return Ok(());
        };
        let now = self.clock.now();
        let vector = self.embedder.embed(&derived.embedding_text).await?;
        let nearest = self.index.nearest(&vector, 5);

        match self.find_matching_pattern(&nearest, derived.target_kind, &derived.target_id).await? {
            Some(mut existing) => {
                let was_auto = existing.auto_approve;
                existing.record_approval(now);
                if !was_auto && existing.auto_approve {
                    outcome.promoted += 1;
                }
                self.patterns.put(existing).await?;
                outcome.patterns_reinforced += 1;
            }
            None => {
                let mut pattern = Pattern::new(
                    derived.kind,
                    derived.value,
                    derived.target_kind,
                    derived.target_id,
                    derived.target_name,
                    now,
                );
                pattern.source_wise_transaction_id = Some(detail.wise_transaction_id.clone());
                pattern.record_approval(now);
                let stored = self.patterns.upsert_new(pattern).await?;
                self.index.insert(stored.id, vector)?;
                outcome.patterns_created += 1;
            }
        }
        Ok(())
    }

    async fn apply_rejection(&self, detail: &SuggestionDetail, outcome: &mut LearningOutcome) -> LearningResult<()> {
        let Some(derived) = mapping::derive(detail) else {
            outcome.skipped_unreviewable += 1;
            return Ok(());
        };
        let vector = self.embedder.embed(&derived.embedding_text).await?;
        let nearest = self.index.nearest(&vector, 5);

        let Some(mut existing) = self.find_matching_pattern(&nearest, derived.target_kind, &derived.target_id).await?
        else {
            debug!(
                suggestion_id = %detail.id,
                "rejected suggestion has no matching pattern to decrement, nothing to learn"
            );
            outcome.skipped_unreviewable += 1;
            return Ok(());
        };

        let now = self.clock.now();
        existing.record_rejection(now);
        outcome.rejections_applied += 1;
        if !existing.active {
            self.index.remove(&existing.id);
            outcome.deactivated += 1;
        }
        self.patterns.put(existing).await?;
        Ok(())
    }

    /// Writes the originating [`BankTransaction`]'s terminal status back once its suggestion has
    /// been reviewed (§3 "terminal when status is matched or unmatched"; §8 invariant 1). The
    /// learning loop is the only component that observes a suggestion's review outcome, so this
    /// is the one place `Submitted` ever advances to `Matched`/`Unmatched`. A suggestion whose
    /// transaction can't be found (already purged, or from a different store than this deployment
    /// wires up) is logged and skipped rather than failing the whole poll.
    async fn transition_transaction(&self, detail: &SuggestionDetail, target: TxStatus) -> LearningResult<()> {
        let reference = Reference::from(detail.wise_transaction_id.as_str());
        let Some(mut tx) = self.transactions.get(&reference).await? else {
            warn!(
                suggestion_id = %detail.id,
                wise_transaction_id = %detail.wise_transaction_id,
                "reviewed suggestion references a transaction this store doesn't have, skipping status update"
            );
            return Ok(());
        };
        if tx.status == target {
            return Ok(());
        }
        if !tx.transition_to(target) {
            warn!(
                tx = %tx.reference,
                from = %tx.status,
                to = %target,
                "reviewed suggestion implies an illegal transaction status transition, leaving as-is"
            );
            return Ok(());
        }
        self.transactions.put(tx).await?;
        Ok(())
    }

    /// The nearest active pattern clearing [`DEDUPE_SIMILARITY_MIN`] that also resolves to the
    /// same target (§4.9 step 2 "and same target"). `nearest` is already sorted descending by
    /// similarity, so the first qualifying hit is the best one.
    async fn find_matching_pattern(
        &self,
        nearest: &[(PatternId, f32)],
        target_kind: TargetKind,
        target_id: &str,
    ) -> LearningResult<Option<Pattern>> {
        for (id, similarity) in nearest {
            if f64::from(*similarity) < DEDUPE_SIMILARITY_MIN {
                break;
            }
            if let Some(pattern) = self.patterns.get(id).await? {
                if pattern.active && pattern.target_kind == target_kind && pattern.target_id == target_id {
                    return Ok(Some(pattern));
                }
            } else {
                warn!(pattern_id = %id, "vector index references a pattern missing from the store");
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use recon_model::{BankTransaction, Direction, GlAccountType, Money, SuggestionId, TransactionKind};
    use recon_patterns::EmbedResult;
    use recon_store::{InMemoryLearningCursorStore, InMemoryPatternStore, InMemoryTransactionStore};
    use recon_time::FrozenClock;

    use super::*;

    struct StubSource(Vec<SuggestionDetail>);

    #[async_trait::async_trait]
    impl ReviewedSuggestionSource for StubSource {
        async fn list_reviewed_since(
            &self,
            _since: Option<chrono::DateTime<Utc>>,
        ) -> LearningResult<Vec<SuggestionDetail>> {
            Ok(self.0.clone())
        }
    }

    struct FixedEmbedder(Vec<f32>);

    #[async_trait::async_trait]
    impl Embedder for FixedEmbedder {
        fn dimension(&self) -> usize {
            self.0.len()
        }
        async fn embed(&self, _text: &str) -> EmbedResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn detail(status: SuggestionStatus, id: &str) -> SuggestionDetail {
        SuggestionDetail {
            id: SuggestionId::from(id),
            wise_transaction_id: format!("TX-{id}"),
            status,
            reviewer: Some("ops".into()),
            execution_outcome: None,
            reviewed_at: Some(Utc::now()),
            gl_type: Some(GlAccountType::Receivable),
            gl_entity: Some("Phygrid Limited".into()),
            description: Some("Invoice payment".into()),
            counterparty_name: Some("Acme Ltd".into()),
            payment_reference: Some("INV-7788".into()),
            is_intercompany: false,
            ic_entity: None,
        }
    }

    /// A `Submitted` transaction for `reference`, standing in for the row C7 would have written
    /// when it first submitted the suggestion this detail reviews.
    fn bank_tx(reference: &str) -> BankTransaction {
        BankTransaction {
            reference: reference.into(),
            entity: "Phygrid Limited".into(),
            profile_id: "p-1".into(),
            direction: Direction::Credit,
            kind: TransactionKind::Transfer,
            occurred_at: Utc::now(),
            amount: Money::new(123456, 2),
            currency: "EUR".into(),
            description: "Invoice payment".into(),
            payment_reference: Some("INV-7788".into()),
            counterparty_name: Some("Acme Ltd".into()),
            counterparty_account: None,
            fx: None,
            fees: Money::ZERO,
            card: None,
            running_balance: Money::ZERO,
            status: TxStatus::Submitted,
            last_attempt_at: Some(Utc::now()),
            attempts: 1,
            best_confidence: 0.9,
            suggestion_id: None,
        }
    }

    async fn harness(
        suggestions: Vec<SuggestionDetail>,
    ) -> (LearningLoop, Arc<InMemoryPatternStore>, Arc<VectorIndex>, Arc<InMemoryTransactionStore>) {
        let patterns = Arc::new(InMemoryPatternStore::new());
        let index = Arc::new(VectorIndex::new(3));
        let cursor = Arc::new(InMemoryLearningCursorStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        for detail in &suggestions {
            transactions.upsert(bank_tx(&detail.wise_transaction_id)).await.unwrap();
        }
        let learning_loop = LearningLoop::new(
            Arc::new(StubSource(suggestions)),
            Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
            index.clone(),
            patterns.clone(),
            cursor,
            transactions.clone(),
            clock,
        );
        (learning_loop, patterns, index, transactions)
    }

    #[tokio::test]
    async fn first_approval_creates_a_new_pattern_and_indexes_its_vector() {
        let (learning_loop, patterns, index, transactions) =
            harness(vec![detail(SuggestionStatus::Approved, "s-1")]).await;
        let outcome = learning_loop.poll().await.unwrap();
        assert_eq!(outcome.patterns_created, 1);
        assert_eq!(outcome.patterns_reinforced, 0);

        let all = patterns.list_active().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].boost, 0.10);
        assert_eq!(all[0].times_approved, 1);
        assert_eq!(index.len(), 1);

        let tx = transactions.get(&"TX-s-1".into()).await.unwrap().unwrap();
        assert_eq!(tx.status, TxStatus::Matched, "approved suggestion must mark its transaction matched");
    }

    #[tokio::test]
    async fn second_matching_approval_reinforces_instead_of_duplicating() {
        let (learning_loop, patterns, _index, _transactions) =
            harness(vec![detail(SuggestionStatus::Approved, "s-1"), detail(SuggestionStatus::Approved, "s-2")])
                .await;
        let outcome = learning_loop.poll().await.unwrap();
        assert_eq!(outcome.patterns_created, 1);
        assert_eq!(outcome.patterns_reinforced, 1);
        assert_eq!(patterns.list_active().await.unwrap().len(), 1);
        assert_eq!(patterns.list_active().await.unwrap()[0].times_approved, 2);
    }

    #[tokio::test]
    async fn ten_clean_approvals_promote_boost_and_flip_auto_approve() {
        let suggestions: Vec<_> =
            (0..10).map(|i| detail(SuggestionStatus::Approved, &format!("s-{i}"))).collect();
        let (learning_loop, patterns, _index, _transactions) = harness(suggestions).await;
        let outcome = learning_loop.poll().await.unwrap();
        assert_eq!(outcome.promoted, 1);
        let pattern = &patterns.list_active().await.unwrap()[0];
        assert!(pattern.auto_approve);
        assert!((pattern.boost - 0.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn three_rejections_deactivate_and_remove_the_vector() {
        let mut suggestions = vec![detail(SuggestionStatus::Approved, "s-0")];
        for i in 0..3 {
            suggestions.push(detail(SuggestionStatus::Rejected, &format!("r-{i}")));
        }
        let (learning_loop, patterns, index, _transactions) = harness(suggestions).await;
        let outcome = learning_loop.poll().await.unwrap();
        assert_eq!(outcome.rejections_applied, 3);
        assert_eq!(outcome.deactivated, 1);
        assert!(patterns.list_active().await.unwrap().is_empty());
        assert_eq!(index.len(), 0);
    }

    #[tokio::test]
    async fn rejection_with_no_matching_pattern_is_a_no_op() {
        let (learning_loop, patterns, _index, transactions) =
            harness(vec![detail(SuggestionStatus::Rejected, "r-0")]).await;
        let outcome = learning_loop.poll().await.unwrap();
        assert_eq!(outcome.rejections_applied, 0);
        assert!(patterns.list_active().await.unwrap().is_empty());

        let tx = transactions.get(&"TX-r-0".into()).await.unwrap().unwrap();
        assert_eq!(tx.status, TxStatus::Unmatched, "rejected suggestion must mark its transaction unmatched");
    }

    #[tokio::test]
    async fn reviewed_suggestion_with_no_known_transaction_is_skipped_without_failing_the_poll() {
        let patterns = Arc::new(InMemoryPatternStore::new());
        let index = Arc::new(VectorIndex::new(3));
        let cursor = Arc::new(InMemoryLearningCursorStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        let source = Arc::new(StubSource(vec![detail(SuggestionStatus::Approved, "orphan")]));
        let learning_loop = LearningLoop::new(
            source,
            Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
            index,
            patterns.clone(),
            cursor,
            transactions,
            clock,
        );
        let outcome = learning_loop.poll().await.unwrap();
        assert_eq!(outcome.patterns_created, 1, "pattern learning proceeds even with no matching transaction row");
    }

    #[tokio::test]
    async fn replaying_the_same_poll_twice_is_idempotent() {
        let suggestions = vec![detail(SuggestionStatus::Approved, "s-1")];
        let patterns = Arc::new(InMemoryPatternStore::new());
        let index = Arc::new(VectorIndex::new(3));
        let cursor = Arc::new(InMemoryLearningCursorStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        transactions.upsert(bank_tx("TX-s-1")).await.unwrap();
        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        let source = Arc::new(StubSource(suggestions));
        let learning_loop = LearningLoop::new(
            source,
            Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
            index.clone(),
            patterns.clone(),
            cursor,
            transactions.clone(),
            clock,
        );
        learning_loop.poll().await.unwrap();
        let second = learning_loop.poll().await.unwrap();
        assert_eq!(second.scanned, 0, "already-processed suggestion must not be refetched by id/reviewed_at");
        assert_eq!(patterns.list_active().await.unwrap().len(), 1);
        let tx = transactions.get(&"TX-s-1".into()).await.unwrap().unwrap();
        assert_eq!(tx.status, TxStatus::Matched);
    }
}
