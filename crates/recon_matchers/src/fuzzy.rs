//! Fuzzy matcher (Tier 2, §4.4.2).

use recon_model::{BankTransaction, Candidate, EntityMap, GlEntry, Pattern, Tier};
use rust_decimal::Decimal;

use crate::similarity::{longest_common_alnum_substring_len, name_similarity};

const NAME_SIMILARITY_MIN: f64 = 0.85;
const NAME_SIMILARITY_HIGH: f64 = 0.95;
const REFERENCE_PARTIAL_MIN: usize = 6;
const REFERENCE_PARTIAL_HIGH: usize = 10;
const DATE_TOLERANCE_DAYS: i64 = 5;

fn same_day_same_amount_count(gl_entries: &[GlEntry], gl: &GlEntry) -> usize {
    gl_entries
        .iter()
        .filter(|other| {
            other.gl_entity == gl.gl_entity
                && other.gl_date.date_naive() == gl.gl_date.date_naive()
                && other.gl_amount == gl.gl_amount
        })
        .count()
}

/// Run the fuzzy matcher against every GL entry in the window, per §4.4.2. `_patterns` is
/// accepted to keep the matcher signature uniform with [`crate::exact::run`]; the fuzzy tier
/// has no pattern-based signal of its own.
pub fn run(
    tx: &BankTransaction,
    gl_entries: &[GlEntry],
    _entities: &EntityMap,
    _patterns: &[Pattern],
) -> Vec<Candidate> {
    let comp_amount = tx.comparison_amount();
    let comp_currency = tx.comparison_currency();
    let mut out = Vec::new();

    for gl in gl_entries {
        let same_currency = comp_currency == gl.currency;
        let delta_amount = (comp_amount - gl.gl_amount).abs();
        let amount_ok = if same_currency {
            delta_amount <= Decimal::new(1, 2)
        } else if gl.gl_amount.is_zero() {
            false
        } else {
            (delta_amount / gl.gl_amount).abs() <= Decimal::new(2, 2)
        };
        if !amount_ok {
            continue;
        }

        let delta_date = (tx.occurred_at - gl.gl_date).num_days().abs();
        if delta_date > DATE_TOLERANCE_DAYS {
            continue;
        }

        let name_sim = tx
            .counterparty_name
            .as_deref()
            .map(|n| name_similarity(n, &gl.gl_entity))
            .unwrap_or(0.0);
        let name_hit = name_sim >= NAME_SIMILARITY_MIN;

        let lcs = tx
            .payment_reference
            .as_deref()
            .map(|r| longest_common_alnum_substring_len(r, gl.gl_tx_id.as_str()))
            .unwrap_or(0);
        let reference_hit = lcs >= REFERENCE_PARTIAL_MIN;

        let unique_hit = same_day_same_amount_count(gl_entries, gl) == 1;

        if !(name_hit || reference_hit || unique_hit) {
            continue;
        }

        let base_score = if name_sim >= NAME_SIMILARITY_HIGH || lcs >= REFERENCE_PARTIAL_HIGH {
            0.85
        } else {
            0.75
        };

        let mut reasons = vec!["amount-fuzzy".to_string()];
        if name_hit {
            reasons.push("name-similarity".to_string());
        }
        if reference_hit {
            reasons.push("reference-partial".to_string());
        }
        if unique_hit {
            reasons.push("amount-entity-unique".to_string());
        }

        out.push(Candidate {
            tx_reference: tx.reference.clone(),
            gl_tx_id: gl.gl_tx_id.clone(),
            gl_line_id: gl.gl_line_id.clone(),
            gl_type: gl.gl_type,
            gl_amount: gl.gl_amount,
            gl_date: gl.gl_date,
            gl_entity: gl.gl_entity.clone(),
            gl_memo: gl.gl_memo.clone(),
            gl_currency: gl.currency.clone(),
            score: base_score,
            tier: Tier::Fuzzy,
            reasons,
            selected: false,
            is_intercompany: false,
            counterparty_entity: None,
            llm_prompt_version: None,
            llm_model_id: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use recon_model::{
        Direction, FxInfo, GlAccountType, GlLineId, GlTransactionId, Money, Rate, Reference,
        SubsidiaryId, TransactionKind, TxStatus,
    };

    use super::*;

    fn gl() -> GlEntry {
        GlEntry {
            gl_tx_id: GlTransactionId::from("GL-1"),
            gl_line_id: GlLineId::from("GL-1-1"),
            gl_type: GlAccountType::Receivable,
            gl_amount: Money::new(100000, 2),
            gl_date: Utc.with_ymd_and_hms(2025, 4, 6, 0, 0, 0).unwrap(),
            gl_entity: "Ombori AG".into(),
            gl_memo: None,
            subsidiary_id: SubsidiaryId::from("sub-2"),
            currency: "EUR".into(),
            reconciled: false,
        }
    }

    fn tx() -> BankTransaction {
        BankTransaction {
            reference: Reference::from("TRANSFER-200"),
            entity: "Acme".into(),
            profile_id: "p-1".into(),
            direction: Direction::Credit,
            kind: TransactionKind::Conversion,
            occurred_at: Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap(),
            amount: Money::new(102000, 2),
            currency: "USD".into(),
            description: "".into(),
            payment_reference: None,
            counterparty_name: Some("OMBORI AG".into()),
            counterparty_account: None,
            fx: Some(FxInfo {
                from_amount: Money::new(100000, 2),
                from_currency: "EUR".into(),
                rate: Rate::new(108, 2),
            }),
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

    #[test]
    fn s2_fuzzy_cross_currency_name_match_scores_0_85() {
        let candidates = run(&tx(), &[gl()], &EntityMap::default(), &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tier, Tier::Fuzzy);
        assert_eq!(candidates[0].score, 0.85);
        assert!(candidates[0].reasons.contains(&"name-similarity".to_string()));
    }

    #[test]
    fn fx_variance_of_2_01_percent_fails_fuzzy() {
        let mut t = tx();
        t.fx.as_mut().unwrap().from_amount = Money::new(97900, 2); // ~2.1% off 1000.00
        assert!(run(&t, &[gl()], &EntityMap::default(), &[]).is_empty());
    }

    #[test]
    fn date_drift_beyond_5_days_fails_fuzzy() {
        let mut t = tx();
        t.occurred_at = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
        assert!(run(&t, &[gl()], &EntityMap::default(), &[]).is_empty());
    }

    #[test]
    fn amount_entity_unique_signal_fires_without_name_or_reference() {
        let mut t = tx();
        t.counterparty_name = None;
        t.fx = None;
        t.currency = "EUR".into();
        t.amount = Money::new(100000, 2);
        let candidates = run(&t, &[gl()], &EntityMap::default(), &[]);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].reasons.contains(&"amount-entity-unique".to_string()));
    }

    #[test]
    fn duplicate_same_day_same_amount_gl_line_blocks_uniqueness_signal() {
        let mut t = tx();
        t.counterparty_name = None;
        t.fx = None;
        t.currency = "EUR".into();
        t.amount = Money::new(100000, 2);
        let mut other = gl();
        other.gl_line_id = GlLineId::from("GL-2-1");
        other.gl_tx_id = GlTransactionId::from("GL-2");
        assert!(run(&t, &[gl(), other], &EntityMap::default(), &[]).is_empty());
    }
}
