use chrono::{DateTime, Utc};
use recon_model::{GlAccountType, GlEntry, GlLineId, GlTransactionId, Money, PatternKind, SuggestionId, TargetKind, Tier};
use serde::{Deserialize, Serialize};

/// Status of a submitted suggestion as tracked by the approval service (§4.9, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    AutoApproved,
    Rejected,
}

impl SuggestionStatus {
    /// Whether this status is the trigger the learning loop polls for (§4.9 step 0).
    pub fn is_learnable_approval(self) -> bool {
        matches!(self, SuggestionStatus::Approved | SuggestionStatus::AutoApproved)
    }
}

/// `POST /api/recon/suggestions` request body (§6). `wise_transaction_id` is the idempotency
/// key the approval service de-dupes on.
#[derive(Clone, Debug, Serialize)]
pub struct SubmitSuggestionRequest {
    pub wise_transaction_id: String,
    pub amount: Money,
    pub currency: String,
    pub gl_tx_id: GlTransactionId,
    pub gl_line_id: GlLineId,
    pub gl_type: GlAccountType,
    pub match_type: Tier,
    pub confidence_score: f64,
    pub match_reasons: Vec<String>,
    pub is_intercompany: bool,
    pub ic_entity: Option<String>,
    pub llm_prompt_version: Option<String>,
    pub llm_model_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitSuggestionResponse {
    pub id: SuggestionId,
    pub status: SuggestionStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmitBatchRequest {
    pub suggestions: Vec<SubmitSuggestionRequest>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitBatchResponse {
    pub batch_id: String,
    pub count: usize,
}

/// `GET /api/recon/suggestions/{id}` response (§6).
///
/// The reviewed-suggestion fields beyond `id`/`status` are an echo of the original
/// [`SubmitSuggestionRequest`] plus the review outcome: enough for the learning loop (C9, §4.9)
/// to derive a `Pattern` without re-fetching the originating `BankTransaction`. The wire
/// contract in spec §6 only names `{status, reviewer, execution outcome}`; this struct
/// additionally threads through the match fields the approval service already has on hand from
/// the submission it is reporting back on (see DESIGN.md).
#[derive(Clone, Debug, Deserialize)]
pub struct SuggestionDetail {
    pub id: SuggestionId,
    pub wise_transaction_id: String,
    pub status: SuggestionStatus,
    pub reviewer: Option<String>,
    pub execution_outcome: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub gl_type: Option<GlAccountType>,
    pub gl_entity: Option<String>,
    pub description: Option<String>,
    pub counterparty_name: Option<String>,
    pub payment_reference: Option<String>,
    pub is_intercompany: bool,
    pub ic_entity: Option<String>,
}

/// `GET /api/recon/suggestions?reviewed_since=...` response (§6, §4.9 "polls ... since the last
/// poll cursor"). Not enumerated as its own bullet in spec §6 — the suggestion-polling
/// contract there is phrased as a capability ("polls for suggestions whose status
/// transitioned..."), not a concrete endpoint; this is the concrete shape that capability needs
/// (see DESIGN.md).
#[derive(Clone, Debug, Deserialize)]
pub struct ListSuggestionsResponse {
    pub suggestions: Vec<SuggestionDetail>,
}

/// `GET /api/recon/gl-entries` response row, in the approval service's wire shape. Converted
/// into [`recon_model::GlEntry`] by [`GlEntryWire::into_entry`].
#[derive(Clone, Debug, Deserialize)]
pub struct GlEntryWire {
    pub gl_tx_id: String,
    pub gl_line_id: String,
    pub gl_type: GlAccountType,
    pub gl_amount: Money,
    pub gl_date: DateTime<Utc>,
    pub gl_entity: String,
    pub gl_memo: Option<String>,
    pub subsidiary_id: String,
    pub currency: String,
    #[serde(default)]
    pub reconciled: bool,
}

impl GlEntryWire {
    pub fn into_entry(self) -> GlEntry {
        GlEntry {
            gl_tx_id: self.gl_tx_id.into(),
            gl_line_id: self.gl_line_id.into(),
            gl_type: self.gl_type,
            gl_amount: self.gl_amount,
            gl_date: self.gl_date,
            gl_entity: self.gl_entity,
            gl_memo: self.gl_memo,
            subsidiary_id: self.subsidiary_id.into(),
            currency: self.currency,
            reconciled: self.reconciled,
        }
    }
}

/// `GET/POST /api/recon/patterns` wire shape (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternWire {
    pub id: Option<String>,
    pub kind: PatternKind,
    pub value: String,
    pub regex: Option<String>,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub target_name: String,
    pub auto_approve: bool,
    pub boost: f64,
    #[serde(default)]
    pub times_approved: u32,
    #[serde(default)]
    pub times_rejected: u32,
}

/// `POST /api/recon/enrich` body (§6).
#[derive(Clone, Debug, Serialize)]
pub struct EnrichmentRequest {
    pub netsuite_transaction_id: String,
    pub wise_transaction_id: String,
    pub enrichment_data: EnrichmentData,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EnrichmentData {
    pub counterparty_name: Option<String>,
    pub counterparty_iban: Option<String>,
    pub payment_reference: Option<String>,
    pub fx_rate: Option<Money>,
    pub from_amount: Option<Money>,
    pub from_currency: Option<String>,
    pub fees: Option<Money>,
    pub is_intercompany: bool,
    pub ic_entity: Option<String>,
    pub merchant_name: Option<String>,
    pub card_last4: Option<String>,
}
