use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::gl::GlAccountType;
use crate::ids::{GlLineId, GlTransactionId, Reference};
use crate::money::{CurrencyCode, Money};

/// Which matching stage produced a [`Candidate`] (§4.4, §9 "dynamic matcher dispatch").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tier {
    Exact,
    Fuzzy,
    Llm,
    Pattern,
}

/// The confidence-scorer's policy decision for a final score (§4.6 threshold table).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Policy {
    AutoApprove,
    Suggest,
    Review,
    Manual,
}

impl Policy {
    /// Classify a clamped final score per the §4.6 threshold table.
    pub fn from_final_score(final_score: f64) -> Self {
        if final_score >= 0.95 {
            Policy::AutoApprove
        } else if final_score >= 0.80 {
            Policy::Suggest
        } else if final_score >= 0.60 {
            Policy::Review
        } else {
            Policy::Manual
        }
    }
}

/// A (tx, GL-line) pairing proposed by a matcher, scoped to a single scoring attempt (§3).
/// Matchers only ever append to the candidate set produced so far in a batch; the scorer (C6)
/// is the sole writer of `selected`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub tx_reference: Reference,
    pub gl_tx_id: GlTransactionId,
    pub gl_line_id: GlLineId,
    pub gl_type: GlAccountType,
    pub gl_amount: Money,
    pub gl_date: chrono::DateTime<chrono::Utc>,
    pub gl_entity: String,
    pub gl_memo: Option<String>,
    pub gl_currency: CurrencyCode,

    pub score: f64,
    pub tier: Tier,
    pub reasons: Vec<String>,
    pub selected: bool,

    pub is_intercompany: bool,
    pub counterparty_entity: Option<String>,

    /// Set only by the LLM matcher, per §9 "LLM non-determinism": every emitted candidate
    /// records which prompt template and model produced it so a non-deterministic source can
    /// still be audited.
    pub llm_prompt_version: Option<String>,
    pub llm_model_id: Option<String>,
}

impl Candidate {
    pub fn delta_amount(&self, tx_amount: Money) -> Money {
        (tx_amount - self.gl_amount).abs()
    }

    pub fn delta_date_days(&self, tx_occurred_at: chrono::DateTime<chrono::Utc>) -> i64 {
        (tx_occurred_at - self.gl_date).num_days().abs()
    }
}
