//! The multi-tier matching engine (C4, §4.4): exact, fuzzy, and LLM matchers chained as a
//! fixed-order pipeline, with the intercompany classifier applied to every candidate they emit.
//!
//! Exact and fuzzy are pure functions; the LLM tier needs an external call and is therefore
//! async. [`MatcherPipeline`] is the single entry point an orchestrator should use — it owns
//! the early-exit and LLM-gating rules from §4.4.3 and §4.7 step 3.

pub mod exact;
pub mod fuzzy;
pub mod intercompany;
pub mod llm;
pub mod similarity;

use std::sync::Arc;

use recon_model::{BankTransaction, Candidate, EntityMap, GlEntry, Pattern};
use tracing::{debug, warn};

pub use intercompany::IntercompanyResult;
pub use llm::{HttpLlmScorer, LlmError, LlmResponse, LlmResult, LlmScorer};

/// Score at or above which the orchestrator's per-tx scan may stop early (§4.7 step 3).
pub const EARLY_EXIT_SCORE: f64 = 0.95;

/// Score below which the LLM tier is invoked as a last resort (§4.4.3).
const LLM_GATE_SCORE: f64 = 0.80;

/// Read-only context every matcher is handed alongside the transaction and GL window.
pub struct MatchContext<'a> {
    pub entities: &'a EntityMap,
    pub patterns: &'a [Pattern],
}

/// A synchronous matching tier: exact and fuzzy are pure functions over their inputs.
pub trait Matcher: Send + Sync {
    fn run(&self, tx: &BankTransaction, gl_entries: &[GlEntry], ctx: &MatchContext<'_>) -> Vec<Candidate>;
}

pub struct ExactMatcher;

impl Matcher for ExactMatcher {
    fn run(&self, tx: &BankTransaction, gl_entries: &[GlEntry], ctx: &MatchContext<'_>) -> Vec<Candidate> {
        exact::run(tx, gl_entries, ctx.entities, ctx.patterns)
    }
}

pub struct FuzzyMatcher;

impl Matcher for FuzzyMatcher {
    fn run(&self, tx: &BankTransaction, gl_entries: &[GlEntry], ctx: &MatchContext<'_>) -> Vec<Candidate> {
        fuzzy::run(tx, gl_entries, ctx.entities, ctx.patterns)
    }
}

/// Apply the intercompany classifier (§4.4.4) to every candidate produced so far. Idempotent:
/// safe to call repeatedly as new candidates are appended.
fn apply_intercompany(candidates: &mut [Candidate], tx: &BankTransaction, entities: &EntityMap) {
    let result = intercompany::classify(tx, entities);
    for candidate in candidates {
        candidate.is_intercompany = result.is_intercompany;
        candidate.counterparty_entity.clone_from(&result.counterparty_entity);
    }
}

fn any_at_least(candidates: &[Candidate], threshold: f64) -> bool {
    candidates.iter().any(|c| c.score >= threshold)
}

/// The fixed-order matcher pipeline (§4.4, §9 "dynamic matcher dispatch"): exact, then fuzzy,
/// then LLM, early-exiting once a candidate clears [`EARLY_EXIT_SCORE`].
pub struct MatcherPipeline {
    exact: ExactMatcher,
    fuzzy: FuzzyMatcher,
    llm: Arc<dyn LlmScorer>,
}

impl MatcherPipeline {
    pub fn new(llm: Arc<dyn LlmScorer>) -> Self {
        Self { exact: ExactMatcher, fuzzy: FuzzyMatcher, llm }
    }

    /// Run all tiers against a single transaction's GL window, honoring early-exit and the LLM
    /// gate, and tag every resulting candidate with the intercompany classification.
    pub async fn run(
        &self,
        tx: &BankTransaction,
        gl_entries: &[GlEntry],
        entities: &EntityMap,
        patterns: &[Pattern],
    ) -> Vec<Candidate> {
        let ctx = MatchContext { entities, patterns };
        let mut candidates = self.exact.run(tx, gl_entries, &ctx);
        apply_intercompany(&mut candidates, tx, entities);
        if any_at_least(&candidates, EARLY_EXIT_SCORE) {
            debug!(tx = %tx.reference, "exact tier cleared early-exit threshold");
            return candidates;
        }

        candidates.extend(self.fuzzy.run(tx, gl_entries, &ctx));
        apply_intercompany(&mut candidates, tx, entities);
        if any_at_least(&candidates, EARLY_EXIT_SCORE) {
            debug!(tx = %tx.reference, "fuzzy tier cleared early-exit threshold");
            return candidates;
        }

        if !any_at_least(&candidates, LLM_GATE_SCORE) && !gl_entries.is_empty() {
            if let Some(candidate) = self.run_llm(tx, gl_entries).await {
                candidates.push(candidate);
                apply_intercompany(&mut candidates, tx, entities);
            }
        }

        candidates
    }

    async fn run_llm(&self, tx: &BankTransaction, gl_entries: &[GlEntry]) -> Option<Candidate> {
        let ranked = llm::rank_candidates(tx, gl_entries, 5);
        let response = match self.llm.score(tx, &ranked).await {
            Ok(response) => response,
            Err(e) => {
                warn!(tx = %tx.reference, error = %e, "llm matcher call failed, discarding");
                return None;
            }
        };
        let gl_id = response.gl_id.as_deref()?;
        let Some(gl) = ranked.iter().find(|g| g.gl_tx_id.as_str() == gl_id) else {
            warn!(tx = %tx.reference, gl_id, "llm response references unknown gl id, discarding");
            return None;
        };
        Some(Candidate {
            tx_reference: tx.reference.clone(),
            gl_tx_id: gl.gl_tx_id.clone(),
            gl_line_id: gl.gl_line_id.clone(),
            gl_type: gl.gl_type,
            gl_amount: gl.gl_amount,
            gl_date: gl.gl_date,
            gl_entity: gl.gl_entity.clone(),
            gl_memo: gl.gl_memo.clone(),
            gl_currency: gl.currency.clone(),
            score: response.clamped_confidence(),
            tier: recon_model::Tier::Llm,
            reasons: vec![response.reasoning.clone()],
            selected: false,
            is_intercompany: false,
            counterparty_entity: None,
            llm_prompt_version: Some(self.llm.prompt_version()),
            llm_model_id: Some(self.llm.model_id()),
        })
    }
}
