use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::ids::{GlLineId, GlTransactionId, SubsidiaryId};
use crate::money::{CurrencyCode, Money};

/// The accounting-system's classification of a GL line, used to scope C3 windowed pulls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GlAccountType {
    Bank,
    Receivable,
    Payable,
    Intercompany,
    Other,
}

/// A single general-ledger line item fetched from the approval service's GL sibling API (C3).
/// Read-only from this crate's point of view; the accounting system of record owns writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlEntry {
    pub gl_tx_id: GlTransactionId,
    pub gl_line_id: GlLineId,
    pub gl_type: GlAccountType,
    pub gl_amount: Money,
    pub gl_date: DateTime<Utc>,
    pub gl_entity: String,
    pub gl_memo: Option<String>,
    pub subsidiary_id: SubsidiaryId,
    pub currency: CurrencyCode,
    pub reconciled: bool,
}
