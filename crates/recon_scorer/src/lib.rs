//! Confidence Scorer (C6, §4.6): folds the §4.6 adjustment table into each candidate's base
//! score, clamps, classifies policy, and breaks ties across a transaction's candidate set.

use recon_model::{BankTransaction, Candidate, Policy};
use tracing::debug;

pub const INTERCOMPANY_ADJUSTMENT: f64 = 0.05;
pub const REPEAT_COUNTERPARTY_ADJUSTMENT: f64 = 0.05;
pub const FX_VARIANCE_PENALTY: f64 = -0.15;
pub const FX_VARIANCE_THRESHOLD: f64 = 0.02;
pub const DATE_DRIFT_PENALTY: f64 = -0.10;
pub const DATE_DRIFT_THRESHOLD_DAYS: i64 = 3;

/// Inputs to the scorer that are shared by every candidate of a single transaction: a pattern
/// boost (from C5), whether the counterparty has a track record (from persisted history), and
/// the FX variance of the transaction's own conversion, if any (§4.6 table).
#[derive(Clone, Debug, Default)]
pub struct ScoringContext {
    pub pattern_boost: Option<f64>,
    pub repeat_counterparty: bool,
    pub fx_variance: Option<f64>,
}

/// A candidate after scoring: its `score`/`reasons` fields are overwritten with the final,
/// adjusted values, and its policy classification is attached.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub policy: Policy,
}

/// Apply the §4.6 adjustment table to one candidate and classify the resulting policy. Mutates
/// and returns the candidate with its `score` set to the clamped final value and its `reasons`
/// extended with which adjustments fired.
pub fn score_candidate(mut candidate: Candidate, tx: &BankTransaction, ctx: &ScoringContext) -> ScoredCandidate {
    let base = candidate.score;
    let mut total = base;

    if candidate.is_intercompany {
        total += INTERCOMPANY_ADJUSTMENT;
        candidate.reasons.push("adj:intercompany".to_string());
    }
    if let Some(boost) = ctx.pattern_boost {
        total += boost;
        candidate.reasons.push(format!("adj:pattern-boost:{boost:.2}"));
    }
    if ctx.repeat_counterparty {
        total += REPEAT_COUNTERPARTY_ADJUSTMENT;
        candidate.reasons.push("adj:repeat-counterparty".to_string());
    }
    if let Some(variance) = ctx.fx_variance {
        if variance.abs() > FX_VARIANCE_THRESHOLD {
            total += FX_VARIANCE_PENALTY;
            candidate.reasons.push("adj:fx-variance".to_string());
        }
    }
    let date_drift = candidate.delta_date_days(tx.occurred_at);
    if date_drift > DATE_DRIFT_THRESHOLD_DAYS {
        total += DATE_DRIFT_PENALTY;
        candidate.reasons.push("adj:date-drift".to_string());
    }

    candidate.score = total.clamp(0.0, 1.0);
    let policy = Policy::from_final_score(candidate.score);
    debug!(
        tx = %candidate.tx_reference,
        gl_id = %candidate.gl_tx_id,
        base, final_score = candidate.score, ?policy,
        "scored candidate"
    );
    ScoredCandidate { candidate, policy }
}

/// Break ties across a transaction's scored candidates per §4.6: higher final score, then lower
/// `|Δamount|`, then lower `|Δdate|`, then lexicographically smaller GL id. Marks exactly one
/// candidate `selected = true` and returns its index, or `None` if `scored` is empty.
pub fn select_winner(scored: &mut [ScoredCandidate], tx: &BankTransaction) -> Option<usize> {
    if scored.is_empty() {
        return None;
    }
    let tx_amount = tx.comparison_amount();
    let winner = (0..scored.len()).min_by(|&a, &b| {
        let ca = &scored[a].candidate;
        let cb = &scored[b].candidate;
        cb.score
            .partial_cmp(&ca.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ca.delta_amount(tx_amount).cmp(&cb.delta_amount(tx_amount)))
            .then_with(|| ca.delta_date_days(tx.occurred_at).cmp(&cb.delta_date_days(tx.occurred_at)))
            .then_with(|| ca.gl_tx_id.cmp(&cb.gl_tx_id))
    })?;
    for (i, s) in scored.iter_mut().enumerate() {
        s.candidate.selected = i == winner;
    }
    Some(winner)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use recon_model::{
        Direction, GlAccountType, GlLineId, GlTransactionId, Money, Policy, Reference,
        SubsidiaryId, Tier, TransactionKind, TxStatus,
    };

    use super::*;

    fn tx() -> BankTransaction {
        BankTransaction {
            reference: Reference::from("T-1"),
            entity: "Acme".into(),
            profile_id: "p-1".into(),
            direction: Direction::Credit,
            kind: TransactionKind::Transfer,
            occurred_at: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            amount: Money::new(100000, 2),
            currency: "EUR".into(),
            description: "".into(),
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

    fn candidate(id: &str, score: f64, date: chrono::DateTime<Utc>, amount: Money) -> Candidate {
        Candidate {
            tx_reference: Reference::from("T-1"),
            gl_tx_id: GlTransactionId::from(id),
            gl_line_id: GlLineId::from(format!("{id}-1")),
            gl_type: GlAccountType::Receivable,
            gl_amount: amount,
            gl_date: date,
            gl_entity: "Acme".into(),
            gl_memo: None,
            gl_currency: "EUR".into(),
            score,
            tier: Tier::Fuzzy,
            reasons: vec![],
            selected: false,
            is_intercompany: false,
            counterparty_entity: None,
            llm_prompt_version: None,
            llm_model_id: None,
        }
    }

    #[test]
    fn s2_intercompany_adjustment_lifts_fuzzy_to_suggest() {
        let t = tx();
        let c = candidate("G1", 0.85, t.occurred_at, t.amount);
        let mut c = c;
        c.is_intercompany = true;
        let scored = score_candidate(c, &t, &ScoringContext::default());
        assert!(scored.candidate.score >= 0.90);
        assert_eq!(scored.policy, Policy::Suggest);
    }

    #[test]
    fn date_drift_beyond_3_days_applies_penalty() {
        let t = tx();
        let drifted_date = t.occurred_at - chrono::Duration::days(4);
        let c = candidate("G1", 0.90, drifted_date, t.amount);
        let scored = score_candidate(c, &t, &ScoringContext::default());
        assert!((scored.candidate.score - 0.80).abs() < 1e-9);
        assert!(scored.candidate.reasons.contains(&"adj:date-drift".to_string()));
    }

    #[test]
    fn score_never_exceeds_one_even_with_multiple_positive_adjustments() {
        let t = tx();
        let mut c = candidate("G1", 0.95, t.occurred_at, t.amount);
        c.is_intercompany = true;
        let ctx = ScoringContext {
            pattern_boost: Some(0.25),
            repeat_counterparty: true,
            fx_variance: None,
        };
        let scored = score_candidate(c, &t, &ctx);
        assert_eq!(scored.candidate.score, 1.0);
    }

    #[test]
    fn tiebreak_prefers_lower_delta_amount_then_lexicographic_gl_id() {
        let t = tx();
        let c1 = candidate("GL-B", 0.90, t.occurred_at, Money::new(99900, 2));
        let c2 = candidate("GL-A", 0.90, t.occurred_at, t.amount);
        let mut scored = vec![
            score_candidate(c1, &t, &ScoringContext::default()),
            score_candidate(c2, &t, &ScoringContext::default()),
        ];
        let winner = select_winner(&mut scored, &t).unwrap();
        assert_eq!(winner, 1);
        assert!(scored[1].candidate.selected);
        assert!(!scored[0].candidate.selected);
    }

    #[test]
    fn exactly_one_candidate_is_selected() {
        let t = tx();
        let mut scored: Vec<ScoredCandidate> = (0..3)
            .map(|i| {
                score_candidate(
                    candidate(&format!("G{i}"), 0.80, t.occurred_at, t.amount),
                    &t,
                    &ScoringContext::default(),
                )
            })
            .collect();
        select_winner(&mut scored, &t);
        assert_eq!(scored.iter().filter(|s| s.candidate.selected).count(), 1);
    }
}
