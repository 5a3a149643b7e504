//! Exact matcher (Tier 1, §4.4.1).

use recon_model::{BankTransaction, Candidate, EntityMap, GlEntry, Pattern, PatternKind, Tier};

use crate::similarity::contains_normalized;

fn pattern_hits(tx: &BankTransaction, patterns: &[Pattern]) -> bool {
    patterns.iter().filter(|p| p.active).any(|p| match p.kind {
        PatternKind::Reference => tx
            .payment_reference
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(&p.value))
            .unwrap_or(false),
        PatternKind::Counterparty => tx
            .counterparty_name
            .as_deref()
            .map(|n| n.eq_ignore_ascii_case(&p.value))
            .unwrap_or(false),
        PatternKind::AmountRange | PatternKind::Description => false,
    })
}

/// Run the exact matcher against every GL entry in the window, per §4.4.1.
pub fn run(
    tx: &BankTransaction,
    gl_entries: &[GlEntry],
    entities: &EntityMap,
    patterns: &[Pattern],
) -> Vec<Candidate> {
    let mut out = Vec::new();
    let pattern_hit = pattern_hits(tx, patterns);
    for gl in gl_entries {
        if tx.currency != gl.currency || tx.amount != gl.gl_amount {
            continue;
        }
        let delta_date = (tx.occurred_at - gl.gl_date).num_days().abs();
        if delta_date > 1 {
            continue;
        }

        let reference_match = tx
            .payment_reference
            .as_deref()
            .map(|r| contains_normalized(r, gl.gl_tx_id.as_str()))
            .unwrap_or(false);
        let iban_match =
            tx.counterparty_account.as_deref().and_then(|a| entities.find_by_iban(a)).is_some();

        if !(reference_match || iban_match || pattern_hit) {
            continue;
        }

        let date_exact = delta_date == 0;
        let score = if reference_match && date_exact {
            1.00
        } else if reference_match {
            0.95
        } else {
            0.90
        };

        let mut reasons = vec!["amount-exact".to_string()];
        if date_exact {
            reasons.push("date-exact".to_string());
        }
        if reference_match {
            reasons.push("reference-match".to_string());
        }
        if iban_match {
            reasons.push("iban-match".to_string());
        }
        if pattern_hit {
            reasons.push("pattern-match".to_string());
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
            score,
            tier: Tier::Exact,
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
