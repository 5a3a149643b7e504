use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `GET /v2/profiles` response row.
#[derive(Clone, Debug, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(rename = "type")]
    pub profile_type: String,
    #[serde(rename = "businessName")]
    pub business_name: Option<String>,
}

/// `GET /v4/profiles/{id}/balances` response row.
#[derive(Clone, Debug, Deserialize)]
pub struct Balance {
    pub id: String,
    pub currency: String,
}

/// `GET /v1/profiles/{id}/balance-statements/{balanceId}/statement.json` response.
#[derive(Clone, Debug, Deserialize)]
pub struct Statement {
    pub transactions: Vec<StatementTransaction>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatementFx {
    #[serde(rename = "fromAmount")]
    pub from_amount: String,
    #[serde(rename = "fromCurrency")]
    pub from_currency: String,
    pub rate: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatementCard {
    pub merchant: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "cardLast4")]
    pub card_last4: Option<String>,
    pub cardholder: Option<String>,
}

/// One raw transaction row inside a [`Statement`], in the bank's own wire shape. Mapping into
/// [`recon_model::BankTransaction`] happens in `recon_ingestion` so this crate stays a thin,
/// read-only client (§4.1 purpose).
#[derive(Clone, Debug, Deserialize)]
pub struct StatementTransaction {
    pub reference: String,
    pub direction: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    pub amount: String,
    pub currency: String,
    pub description: String,
    #[serde(rename = "paymentReference")]
    pub payment_reference: Option<String>,
    #[serde(rename = "counterpartyName")]
    pub counterparty_name: Option<String>,
    #[serde(rename = "counterpartyAccount")]
    pub counterparty_account: Option<String>,
    pub fx: Option<StatementFx>,
    #[serde(default)]
    pub fees: Option<String>,
    pub card: Option<StatementCard>,
    #[serde(rename = "runningBalance")]
    pub running_balance: Option<String>,
}
