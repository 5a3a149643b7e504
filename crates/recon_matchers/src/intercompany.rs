//! Intercompany classifier (§4.4.4), applied to every candidate regardless of which tier
//! produced it.

use recon_model::{BankTransaction, EntityMap};

/// Result of classifying a transaction against the [`EntityMap`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntercompanyResult {
    pub is_intercompany: bool,
    pub counterparty_entity: Option<String>,
}

/// Classify `tx` as intercompany iff any of the three signals in §4.4.4 fire.
pub fn classify(tx: &BankTransaction, entities: &EntityMap) -> IntercompanyResult {
    if let Some(name) = tx.counterparty_name.as_deref() {
        if let Some(entity) = entities.find_by_name(name) {
            return IntercompanyResult {
                is_intercompany: true,
                counterparty_entity: Some(entity.display_name.clone()),
            };
        }
    }
    if let Some(account) = tx.counterparty_account.as_deref() {
        if let Some(entity) = entities.find_by_iban(account) {
            return IntercompanyResult {
                is_intercompany: true,
                counterparty_entity: Some(entity.display_name.clone()),
            };
        }
    }
    if let Some(reference) = tx.payment_reference.as_deref() {
        if entities.payment_reference_signals_ic(reference) {
            return IntercompanyResult { is_intercompany: true, counterparty_entity: None };
        }
    }
    IntercompanyResult::default()
}

#[cfg(test)]
mod tests {
    use recon_model::Entity;

    use super::*;

    fn entities() -> EntityMap {
        EntityMap::new(vec![Entity {
            key: "ombori-ag".into(),
            profile_id: "p-2".into(),
            subsidiary_id: "sub-2".into(),
            display_name: "Ombori AG".into(),
            jurisdiction: "SE".into(),
            currency: "SEK".into(),
            aliases: vec![],
            known_ibans: vec!["BE82967831096568".into()],
        }])
    }

    fn tx() -> BankTransaction {
        use recon_model::{Direction, Money, Reference, TransactionKind, TxStatus};
        BankTransaction {
            reference: Reference::from("T-1"),
            entity: "Acme".into(),
            profile_id: "p-1".into(),
            direction: Direction::Credit,
            kind: TransactionKind::Transfer,
            occurred_at: chrono::Utc::now(),
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

    #[test]
    fn classifies_by_iban_s3() {
        let mut t = tx();
        t.counterparty_account = Some("BE82967831096568".into());
        let result = classify(&t, &entities());
        assert!(result.is_intercompany);
        assert_eq!(result.counterparty_entity.as_deref(), Some("Ombori AG"));
    }

    #[test]
    fn classifies_by_name() {
        let mut t = tx();
        t.counterparty_name = Some("ombori ag".into());
        let result = classify(&t, &entities());
        assert!(result.is_intercompany);
    }

    #[test]
    fn non_intercompany_transaction_is_not_flagged() {
        let t = tx();
        let result = classify(&t, &entities());
        assert!(!result.is_intercompany);
        assert!(result.counterparty_entity.is_none());
    }
}
