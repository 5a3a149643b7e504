use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::ids::{ProfileId, Reference, SuggestionId};
use crate::money::{CurrencyCode, Money, Rate};

/// Direction of money movement relative to the bank account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Direction {
    Debit,
    Credit,
}

/// The bank's classification of a transaction. Mirrors the kinds the bank API actually emits;
/// new kinds are additive and must not break existing matchers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
pub enum TransactionKind {
    Transfer,
    Deposit,
    Card,
    Conversion,
    MoneyAdded,
    IncomingCrossBalance,
    OutgoingCrossBalance,
    DirectDebit,
    BalanceInterest,
    BalanceAdjustment,
}

/// Foreign-exchange leg of a transaction, present when the bank converted currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FxInfo {
    pub from_amount: Money,
    pub from_currency: CurrencyCode,
    pub rate: Rate,
}

/// Card-present/card-not-present metadata, present only for [`TransactionKind::Card`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CardInfo {
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub card_last4: Option<String>,
    pub cardholder: Option<String>,
}

/// Lifecycle status of a [`BankTransaction`]. Only ever advances forward; see
/// [`BankTransaction::can_transition_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Submitted,
    Matched,
    Unmatched,
}

impl TxStatus {
    /// Whether `self -> next` is an allowed transition per the invariant in spec §3:
    /// `pending -> submitted -> {matched, unmatched}`.
    pub fn can_transition_to(self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Submitted)
                | (TxStatus::Submitted, TxStatus::Matched)
                | (TxStatus::Submitted, TxStatus::Unmatched)
                // Re-attempting a failed submission (orchestrator rollback, §4.7 step 7).
                | (TxStatus::Submitted, TxStatus::Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Matched | TxStatus::Unmatched)
    }
}

/// A single bank transaction as ingested by C2, carrying both the bank's data and this system's
/// match-state.
///
/// `reference` is the identity and is immutable for the lifetime of the row (§3 invariants).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub reference: Reference,
    pub entity: String,
    pub profile_id: ProfileId,
    pub direction: Direction,
    pub kind: TransactionKind,
    pub occurred_at: DateTime<Utc>,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub description: String,
    pub payment_reference: Option<String>,
    pub counterparty_name: Option<String>,
    pub counterparty_account: Option<String>,
    pub fx: Option<FxInfo>,
    pub fees: Money,
    pub card: Option<CardInfo>,
    pub running_balance: Money,

    pub status: TxStatus,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub best_confidence: f64,
    pub suggestion_id: Option<SuggestionId>,
}

impl BankTransaction {
    /// Attempt a status transition, enforcing the forward-only invariant. Returns `false`
    /// (no-op) instead of panicking on an illegal transition so callers can log and continue.
    #[must_use]
    pub fn transition_to(&mut self, next: TxStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// Record a scoring attempt: bumps `attempts` monotonically and raises `best_confidence` to
    /// the maximum observed, never lowers it (§3 invariant 3 / §8 invariant 3).
    pub fn record_attempt(&mut self, now: DateTime<Utc>, confidence: f64) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt_at = Some(now);
        if confidence > self.best_confidence {
            self.best_confidence = confidence.clamp(0.0, 1.0);
        }
    }

    /// The amount used for cross-currency tolerance comparisons: `from_amount` when an FX leg is
    /// present, else `amount` (§4.4.2).
    pub fn comparison_amount(&self) -> Money {
        self.fx.as_ref().map(|fx| fx.from_amount).unwrap_or(self.amount)
    }

    pub fn comparison_currency(&self) -> &str {
        self.fx.as_ref().map(|fx| fx.from_currency.as_str()).unwrap_or(self.currency.as_str())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> BankTransaction {
        BankTransaction {
            reference: Reference::from("TRANSFER-100"),
            entity: "Phygrid Limited".into(),
            profile_id: ProfileId::from("p-1"),
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
            status: TxStatus::Pending,
            last_attempt_at: None,
            attempts: 0,
            best_confidence: 0.0,
            suggestion_id: None,
        }
    }

    #[test]
    fn status_only_advances_forward() {
        let mut tx = sample();
        assert!(tx.transition_to(TxStatus::Submitted));
        assert_eq!(tx.status, TxStatus::Submitted);
        assert!(tx.transition_to(TxStatus::Matched));
        assert_eq!(tx.status, TxStatus::Matched);
        // Matched is terminal; cannot go back to pending or submitted.
        assert!(!tx.transition_to(TxStatus::Pending));
        assert!(!tx.transition_to(TxStatus::Submitted));
        assert_eq!(tx.status, TxStatus::Matched);
    }

    #[test]
    fn submitted_can_roll_back_to_pending_on_emission_failure() {
        let mut tx = sample();
        assert!(tx.transition_to(TxStatus::Submitted));
        assert!(tx.transition_to(TxStatus::Pending));
        assert_eq!(tx.status, TxStatus::Pending);
    }

    #[test]
    fn pending_cannot_skip_straight_to_matched() {
        let mut tx = sample();
        assert!(!tx.transition_to(TxStatus::Matched));
        assert_eq!(tx.status, TxStatus::Pending);
    }

    #[test]
    fn best_confidence_is_the_max_not_the_last() {
        let mut tx = sample();
        let now = Utc::now();
        tx.record_attempt(now, 0.9);
        tx.record_attempt(now, 0.4);
        assert_eq!(tx.attempts, 2);
        assert_eq!(tx.best_confidence, 0.9);
    }

    #[test]
    fn comparison_amount_prefers_fx_leg() {
        let mut tx = sample();
        tx.fx = Some(FxInfo {
            from_amount: Money::new(100000, 2),
            from_currency: "EUR".into(),
            rate: Rate::new(108, 2),
        });
        assert_eq!(tx.comparison_amount(), Money::new(100000, 2));
        assert_eq!(tx.comparison_currency(), "EUR");
    }
}
