use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::ids::{BalanceId, ProfileId};
use crate::money::CurrencyCode;

/// Status of a [`SyncCursor`]. At most one row per (profile, currency) may be `Syncing` at a
/// time (§3 invariant).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CursorStatus {
    Idle,
    Syncing,
    Error,
}

/// The per-(profile, currency) high-water mark used for incremental ingestion (C2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub profile_id: ProfileId,
    pub currency: CurrencyCode,
    pub balance_id: BalanceId,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_end_date: DateTime<Utc>,
    pub status: CursorStatus,
    pub error: Option<String>,
    pub count: u64,
}

impl SyncCursor {
    pub fn new(profile_id: ProfileId, currency: CurrencyCode, balance_id: BalanceId, epoch: DateTime<Utc>) -> Self {
        Self {
            profile_id,
            currency,
            balance_id,
            last_synced_at: None,
            last_end_date: epoch,
            status: CursorStatus::Idle,
            error: None,
            count: 0,
        }
    }
}
