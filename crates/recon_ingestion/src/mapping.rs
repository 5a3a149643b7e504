//! Maps the bank's wire shapes ([`recon_bank_client::StatementTransaction`]) into the domain
//! model ([`recon_model::BankTransaction`]). This is the only crate that needs to know both
//! schemas (§4.1 module doc).

use std::str::FromStr;

use recon_bank_client::StatementTransaction;
use recon_model::{
    BankTransaction, CardInfo, Direction, FxInfo, Money, ProfileId, Reference, TransactionKind,
    TxStatus,
};

use crate::error::{IngestionError, IngestionResult};

fn parse_money(raw: &str, field: &str) -> IngestionResult<Money> {
    Money::from_str(raw).map_err(|_| IngestionError::Validation(format!("invalid {field}: {raw}")))
}

fn parse_direction(raw: &str) -> IngestionResult<Direction> {
    Direction::from_str(&raw.to_lowercase())
        .map_err(|_| IngestionError::Validation(format!("unknown direction: {raw}")))
}

fn parse_kind(raw: &str) -> IngestionResult<TransactionKind> {
    TransactionKind::from_str(&raw.to_lowercase())
        .map_err(|_| IngestionError::Validation(format!("unknown transaction kind: {raw}")))
}

/// Map one wire row into a domain [`BankTransaction`], freshly `pending` (§3 lifecycle: "created
/// by C2 on first sight"). Match-state fields are set to their zero value here; the store's
/// upsert is responsible for preserving them across replays (§4.2 step 4).
pub fn map_transaction(
    profile_id: &ProfileId,
    entity: &str,
    row: StatementTransaction,
) -> IngestionResult<BankTransaction> {
    let direction = parse_direction(&row.direction)?;
    let kind = parse_kind(&row.kind)?;
    let amount = parse_money(&row.amount, "amount")?;
    let fees = match row.fees {
        Some(raw) => parse_money(&raw, "fees")?,
        None => Money::ZERO,
    };
    let running_balance = match row.running_balance {
        Some(raw) => parse_money(&raw, "runningBalance")?,
        None => Money::ZERO,
    };
    let fx = row
        .fx
        .map(|fx| -> IngestionResult<FxInfo> {
            Ok(FxInfo {
                from_amount: parse_money(&fx.from_amount, "fx.fromAmount")?,
                from_currency: fx.from_currency,
                rate: parse_money(&fx.rate, "fx.rate")?,
            })
        })
        .transpose()?;
    let card = row.card.map(|c| CardInfo {
        merchant: c.merchant,
        category: c.category,
        card_last4: c.card_last4,
        cardholder: c.cardholder,
    });

    Ok(BankTransaction {
        reference: Reference::from(row.reference),
        entity: entity.to_string(),
        profile_id: profile_id.clone(),
        direction,
        kind,
        occurred_at: row.date,
        amount,
        currency: row.currency,
        description: row.description,
        payment_reference: row.payment_reference,
        counterparty_name: row.counterparty_name,
        counterparty_account: row.counterparty_account,
        fx,
        fees,
        card,
        running_balance,
        status: TxStatus::Pending,
        last_attempt_at: None,
        attempts: 0,
        best_confidence: 0.0,
        suggestion_id: None,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use recon_bank_client::{StatementCard, StatementFx};

    use super::*;

    fn row() -> StatementTransaction {
        StatementTransaction {
            reference: "TRANSFER-100".into(),
            direction: "CREDIT".into(),
            kind: "TRANSFER".into(),
            date: Utc::now(),
            amount: "1234.56".into(),
            currency: "EUR".into(),
            description: "Invoice payment".into(),
            payment_reference: Some("INV-7788".into()),
            counterparty_name: Some("Acme Ltd".into()),
            counterparty_account: None,
            fx: None,
            fees: Some("0.50".into()),
            card: None,
            running_balance: Some("9000.00".into()),
        }
    }

    #[test]
    fn maps_wire_shape_into_pending_domain_transaction() {
        let tx = map_transaction(&ProfileId::from("p-1"), "Phygrid Limited", row()).unwrap();
        assert_eq!(tx.reference.as_str(), "TRANSFER-100");
        assert_eq!(tx.direction, Direction::Credit);
        assert_eq!(tx.kind, TransactionKind::Transfer);
        assert_eq!(tx.amount, Money::new(123456, 2));
        assert_eq!(tx.status, TxStatus::Pending);
        assert_eq!(tx.attempts, 0);
    }

    #[test]
    fn maps_fx_and_card_blocks_when_present() {
        let mut r = row();
        r.fx = Some(StatementFx {
            from_amount: "1000.00".into(),
            from_currency: "USD".into(),
            rate: "1.08".into(),
        });
        r.card = Some(StatementCard {
            merchant: Some("Shop".into()),
            category: None,
            card_last4: Some("4242".into()),
            cardholder: None,
        });
        let tx = map_transaction(&ProfileId::from("p-1"), "Phygrid Limited", r).unwrap();
        assert_eq!(tx.fx.unwrap().from_currency, "USD");
        assert_eq!(tx.card.unwrap().card_last4.as_deref(), Some("4242"));
    }

    #[test]
    fn unparseable_amount_is_quarantined_not_panicked() {
        let mut r = row();
        r.amount = "not-a-number".into();
        let result = map_transaction(&ProfileId::from("p-1"), "Phygrid Limited", r);
        assert!(matches!(result, Err(IngestionError::Validation(_))));
    }

    #[test]
    fn unknown_direction_is_quarantined() {
        let mut r = row();
        r.direction = "SIDEWAYS".into();
        let result = map_transaction(&ProfileId::from("p-1"), "Phygrid Limited", r);
        assert!(matches!(result, Err(IngestionError::Validation(_))));
    }
}
