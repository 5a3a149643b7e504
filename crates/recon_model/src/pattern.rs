use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::ids::PatternId;

/// What a [`Pattern`] matches against (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatternKind {
    Counterparty,
    Reference,
    AmountRange,
    Description,
}

/// What kind of accounting entity a [`Pattern`] resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetKind {
    Vendor,
    Customer,
    Account,
    Subsidiary,
}

/// A learned correspondence between some observable signal on a bank transaction and an
/// accounting target, used to boost confidence on future similar transactions (§4.5, §4.9).
///
/// Patterns reference transactions only via `wise_transaction_id` (§9 "cyclic references"); they
/// never embed a [`crate::BankTransaction`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub kind: PatternKind,
    pub value: String,
    pub regex: Option<String>,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub target_name: String,
    pub auto_approve: bool,
    pub boost: f64,

    pub times_approved: u32,
    pub times_rejected: u32,
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// The originating approved suggestion, kept as a weak string reference so this row survives
    /// independently of transaction/suggestion retention policy.
    pub source_wise_transaction_id: Option<String>,
}

impl Pattern {
    pub const MIN_BOOST: f64 = 0.0;
    pub const MAX_BOOST: f64 = 0.25;
    pub const INITIAL_BOOST: f64 = 0.10;
    pub const PROMOTION_STEP: f64 = 0.05;
    pub const PROMOTION_MIN_APPROVALS: u32 = 10;
    pub const PROMOTION_MAX_REJECTION_RATE: f64 = 0.05;
    pub const DEACTIVATION_REJECTIONS: u32 = 3;

    pub fn new(
        kind: PatternKind,
        value: String,
        target_kind: TargetKind,
        target_id: String,
        target_name: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PatternId::new(),
            kind,
            value,
            regex: None,
            target_kind,
            target_id,
            target_name,
            auto_approve: false,
            boost: Self::INITIAL_BOOST,
            times_approved: 0,
            times_rejected: 0,
            active: true,
            created_at: now,
            updated_at: now,
            source_wise_transaction_id: None,
        }
    }

    /// The (kind, value, target_kind) uniqueness tuple (§3, §8 "Pattern uniqueness").
    pub fn uniqueness_key(&self) -> (PatternKind, &str, TargetKind) {
        (self.kind, self.value.as_str(), self.target_kind)
    }

    pub fn rejection_rate(&self) -> f64 {
        let total = self.times_approved + self.times_rejected;
        if total == 0 {
            0.0
        } else {
            f64::from(self.times_rejected) / f64::from(total)
        }
    }

    /// Record an approval and apply the promotion rule (§4.9 step 4): once approved at least
    /// [`Self::PROMOTION_MIN_APPROVALS`] times with a rejection rate under the threshold, bump
    /// the boost and, if there have been zero rejections, flip on auto-approve.
    pub fn record_approval(&mut self, now: DateTime<Utc>) {
        self.times_approved = self.times_approved.saturating_add(1);
        self.updated_at = now;
        if self.times_approved >= Self::PROMOTION_MIN_APPROVALS
            && self.rejection_rate() < Self::PROMOTION_MAX_REJECTION_RATE
        {
            self.boost = (self.boost + Self::PROMOTION_STEP).min(Self::MAX_BOOST);
            if self.times_rejected == 0 {
                self.auto_approve = true;
            }
        }
    }

    /// Record a rejection (§4.9 "poisoning resistance"): counters never go negative, and a
    /// pattern rejected [`Self::DEACTIVATION_REJECTIONS`] times is deactivated.
    pub fn record_rejection(&mut self, now: DateTime<Utc>) {
        self.times_rejected = self.times_rejected.saturating_add(1);
        self.updated_at = now;
        if self.times_rejected >= Self::DEACTIVATION_REJECTIONS {
            self.active = false;
            self.auto_approve = false;
        }
    }
}
