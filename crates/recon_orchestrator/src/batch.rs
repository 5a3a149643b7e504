//! Per-entity batch pipeline (C7, §4.7).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use recon_approval_client::SubmitSuggestionRequest;
use recon_gl_cache::{GlFetcher, GlQuery};
use recon_matchers::MatcherPipeline;
use recon_model::{
    BankTransaction, Candidate, Entity, EntityMap, GlAccountType, Pattern, TxStatus,
};
use recon_patterns::{build_text, resolve_boost, Embedder, VectorIndex};
use recon_scorer::{score_candidate, select_winner, ScoringContext};
use recon_store::{LeaseStore, PatternStore, TransactionStore};
use recon_time::SharedClock;
use rust_decimal::prelude::ToPrimitive;
use tracing::{info, warn};

use crate::emit::SuggestionSink;
use crate::error::OrchestratorResult;

const ACCOUNT_TYPES: [GlAccountType; 4] =
    [GlAccountType::Bank, GlAccountType::Receivable, GlAccountType::Payable, GlAccountType::Intercompany];

/// Outcome of one batch run for a single entity, for scheduler/Slack reporting (§6 Slack batch
/// summary).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub entity: String,
    pub scanned: usize,
    pub submitted: usize,
    pub unmatched: usize,
    pub emission_failed: usize,
    pub lease_conflicts: usize,
}

/// The deviation between a transaction's booked amount and what its own FX leg implies, as a
/// fraction of the implied amount. `None` when there's no FX leg to check (§4.6 table).
fn fx_variance(tx: &BankTransaction) -> Option<f64> {
    let fx = tx.fx.as_ref()?;
    if fx.rate.is_zero() || fx.from_amount.is_zero() {
        return None;
    }
    let implied = fx.from_amount * fx.rate;
    if implied.is_zero() {
        return None;
    }
    let variance = ((tx.amount - implied) / implied).abs();
    variance.to_f64()
}

/// Minimum number of prior approvals for the same counterparty before the "repeat counterparty"
/// adjustment applies (§4.6: "counterparty appeared in ≥ 3 prior approvals").
const REPEAT_COUNTERPARTY_MIN_APPROVALS: usize = 3;

/// `Matched` is the only status that records an actual approval (§3, §4.9: the learning loop
/// flips a transaction to `Matched` once its suggestion is reviewed and approved) — `Submitted`
/// only means a suggestion is awaiting review, not that anyone approved it.
fn has_repeat_history(tx: &BankTransaction, history: &[BankTransaction]) -> bool {
    let Some(name) = tx.counterparty_name.as_deref() else { return false };
    let prior_approvals = history
        .iter()
        .filter(|other| {
            other.reference != tx.reference
                && other.counterparty_name.as_deref() == Some(name)
                && other.status == TxStatus::Matched
        })
        .count();
    prior_approvals >= REPEAT_COUNTERPARTY_MIN_APPROVALS
}

fn build_request(tx: &BankTransaction, candidate: &Candidate) -> SubmitSuggestionRequest {
    SubmitSuggestionRequest {
        wise_transaction_id: tx.reference.as_str().to_string(),
        amount: tx.amount,
        currency: tx.currency.clone(),
        gl_tx_id: candidate.gl_tx_id.clone(),
        gl_line_id: candidate.gl_line_id.clone(),
        gl_type: candidate.gl_type,
        match_type: candidate.tier,
        confidence_score: candidate.score,
        match_reasons: candidate.reasons.clone(),
        is_intercompany: candidate.is_intercompany,
        ic_entity: candidate.counterparty_entity.clone(),
        llm_prompt_version: candidate.llm_prompt_version.clone(),
        llm_model_id: candidate.llm_model_id.clone(),
    }
}

/// Wires C2's output through C3/C4/C5/C6 into C8, one entity at a time (§4.7). Single-leader
/// per entity is enforced by the caller (§4.10 scheduler), not by this struct.
pub struct Orchestrator {
    transactions: Arc<dyn TransactionStore>,
    gl: Arc<GlFetcher>,
    matchers: Arc<MatcherPipeline>,
    pattern_store: Arc<dyn PatternStore>,
    vector_index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    leases: Arc<dyn LeaseStore>,
    sink: Arc<dyn SuggestionSink>,
    clock: SharedClock,
    lease_ttl: StdDuration,
    max_tx_per_run: usize,
    date_window_days: i64,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        gl: Arc<GlFetcher>,
        matchers: Arc<MatcherPipeline>,
        pattern_store: Arc<dyn PatternStore>,
        vector_index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        leases: Arc<dyn LeaseStore>,
        sink: Arc<dyn SuggestionSink>,
        clock: SharedClock,
        lease_ttl: StdDuration,
        max_tx_per_run: usize,
        date_window_days: i64,
    ) -> Self {
        Self {
            transactions,
            gl,
            matchers,
            pattern_store,
            vector_index,
            embedder,
            leases,
            sink,
            clock,
            lease_ttl,
            max_tx_per_run,
            date_window_days,
        }
    }

    /// Run steps 1-7 of §4.7 for one entity's pending transactions.
    pub async fn run_for_entity(&self, entity: &Entity, entities: &EntityMap) -> OrchestratorResult<BatchOutcome> {
        let now = self.clock.now();
        let history = self.transactions.list_by_profile(&entity.profile_id).await?;
        let mut pending: Vec<BankTransaction> =
            history.iter().filter(|t| t.status == TxStatus::Pending).cloned().collect();
        pending.sort_by_key(|t| t.occurred_at);
        pending.truncate(self.max_tx_per_run);

        let active_patterns = self.pattern_store.list_active().await?;

        let mut outcome = BatchOutcome { entity: entity.display_name.clone(), ..Default::default() };
        for mut tx in pending {
            outcome.scanned += 1;
            let token = match self.leases.acquire(&tx.reference, self.lease_ttl, now).await {
                Ok(token) => token,
                Err(recon_store::StoreError::LeaseConflict(_)) => {
                    outcome.lease_conflicts += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let result = self.score_one(&mut tx, entity, entities, &active_patterns, &history, now).await;
            self.leases.release(&tx.reference, token).await;
            match result? {
                Outcome::Submitted => outcome.submitted += 1,
                Outcome::Unmatched => outcome.unmatched += 1,
                Outcome::EmissionFailed => outcome.emission_failed += 1,
            }
        }

        info!(
            entity = %entity.display_name,
            scanned = outcome.scanned,
            submitted = outcome.submitted,
            unmatched = outcome.unmatched,
            "batch complete"
        );
        Ok(outcome)
    }

    async fn score_one(
        &self,
        tx: &mut BankTransaction,
        entity: &Entity,
        entities: &EntityMap,
        active_patterns: &[Pattern],
        history: &[BankTransaction],
        now: DateTime<Utc>,
    ) -> OrchestratorResult<Outcome> {
        let window_start = tx.occurred_at - ChronoDuration::days(self.date_window_days);
        let window_end = tx.occurred_at + ChronoDuration::days(self.date_window_days);
        let query = GlQuery {
            subsidiary_id: entity.subsidiary_id.clone(),
            start_date: window_start,
            end_date: window_end,
            account_types: ACCOUNT_TYPES.to_vec(),
            unreconciled_only: true,
        };
        let gl_entries = self.gl.get_gl_entries(query).await?;
        let candidates = self.matchers.run(tx, &gl_entries, entities, active_patterns).await;
        if candidates.is_empty() {
            tx.record_attempt(now, 0.0);
            self.transactions.put(tx.clone()).await?;
            return Ok(Outcome::Unmatched);
        }

        let pattern_boost = self.resolve_pattern_boost(tx, active_patterns).await?.map(|b| b.boost);
        let ctx = ScoringContext {
            pattern_boost,
            repeat_counterparty: has_repeat_history(tx, history),
            fx_variance: fx_variance(tx),
        };
        let mut scored: Vec<_> = candidates.into_iter().map(|c| score_candidate(c, tx, &ctx)).collect();
        let Some(winner_idx) = select_winner(&mut scored, tx) else {
            tx.record_attempt(now, 0.0);
            self.transactions.put(tx.clone()).await?;
            return Ok(Outcome::Unmatched);
        };
        let winner = scored[winner_idx].candidate.clone();

        tx.record_attempt(now, winner.score);
        tx.transition_to(TxStatus::Submitted);
        let request = build_request(tx, &winner);
        match self.sink.submit(&request).await {
            Ok(response) => {
                tx.suggestion_id = Some(response.id);
                self.transactions.put(tx.clone()).await?;
                Ok(Outcome::Submitted)
            }
            Err(e) => {
                warn!(tx = %tx.reference, error = %e, "suggestion emission failed, rolling back to pending");
                tx.transition_to(TxStatus::Pending);
                self.transactions.put(tx.clone()).await?;
                Ok(Outcome::EmissionFailed)
            }
        }
    }

    /// Embed the transaction's canonical text, query the vector index, and resolve the winning
    /// boost against currently active patterns (§4.5, §4.6 table).
    async fn resolve_pattern_boost(
        &self,
        tx: &BankTransaction,
        active_patterns: &[Pattern],
    ) -> OrchestratorResult<Option<recon_patterns::PatternBoost>> {
        let text = build_text(&tx.description, tx.counterparty_name.as_deref(), tx.payment_reference.as_deref());
        let vector = self.embedder.embed(&text).await?;
        let nearest = self.vector_index.nearest(&vector, 5);
        let lookup = |id: &recon_model::PatternId| active_patterns.iter().find(|p| &p.id == id).cloned();
        Ok(resolve_boost(&nearest, lookup))
    }
}

enum Outcome {
    Submitted,
    Unmatched,
    EmissionFailed,
}
