//! LLM matcher (Tier 3, §4.4.3): invoked only when tiers 1-2 leave no strong candidate.

use recon_model::{BankTransaction, GlEntry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIDENCE_FLOOR: f64 = 0.50;
const CONFIDENCE_CEILING: f64 = 0.89;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm call failed: {0}")]
    Call(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// The model's verdict on one of the candidate GL entries handed to it, or `none` (§4.4.3).
#[derive(Clone, Debug, PartialEq)]
pub struct LlmResponse {
    pub gl_id: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
}

impl LlmResponse {
    /// Clamp the model's raw confidence to the tier's score band (§4.4.3).
    pub fn clamped_confidence(&self) -> f64 {
        self.confidence.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
    }
}

/// Abstraction over whatever model backs the LLM matcher; swappable for tests and for the
/// configured embedder/LLM provider (§4.11).
#[async_trait::async_trait]
pub trait LlmScorer: Send + Sync {
    async fn score(&self, tx: &BankTransaction, candidates: &[GlEntry]) -> LlmResult<LlmResponse>;

    /// Identifies the model backing this scorer, recorded on every candidate it produces
    /// (§3 `Candidate.llm_model_id`). Defaults to a placeholder for test doubles.
    fn model_id(&self) -> String {
        "configured-llm".to_string()
    }

    /// The prompt template version in effect, recorded alongside `model_id` (§3
    /// `Candidate.llm_prompt_version`).
    fn prompt_version(&self) -> String {
        "recon-match-v1".to_string()
    }
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    transaction: &'a BankTransaction,
    candidates: &'a [GlEntry],
    prompt_template_version: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    gl_id: Option<String>,
    confidence: f64,
    reasoning: String,
}

/// An [`LlmScorer`] backed by a configured HTTP endpoint (§4.11 `llm.endpoint`). Sends the
/// transaction and its ranked candidates as JSON and expects a single verdict back, matching the
/// plain-JSON wire conventions used by the other external clients in this port.
pub struct HttpLlmScorer {
    http: reqwest::Client,
    endpoint: url::Url,
    model_id: String,
    prompt_template_version: String,
}

impl HttpLlmScorer {
    pub fn new(http: reqwest::Client, endpoint: url::Url, model_id: String, prompt_template_version: String) -> Self {
        Self { http, endpoint, model_id, prompt_template_version }
    }
}

#[async_trait::async_trait]
impl LlmScorer for HttpLlmScorer {
    async fn score(&self, tx: &BankTransaction, candidates: &[GlEntry]) -> LlmResult<LlmResponse> {
        let request =
            ScoreRequest { transaction: tx, candidates, prompt_template_version: &self.prompt_template_version };
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Call(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LlmError::Call(format!("llm endpoint returned status {}", response.status())));
        }
        let body: ScoreResponse =
            response.json().await.map_err(|e| LlmError::Call(format!("invalid llm response: {e}")))?;
        Ok(LlmResponse { gl_id: body.gl_id, confidence: body.confidence, reasoning: body.reasoning })
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    fn prompt_version(&self) -> String {
        self.prompt_template_version.clone()
    }
}

/// Rank GL entries by (amount closeness, date closeness) and take the top `limit` (§4.4.3).
pub fn rank_candidates(tx: &BankTransaction, gl_entries: &[GlEntry], limit: usize) -> Vec<GlEntry> {
    let mut ranked: Vec<&GlEntry> = gl_entries.iter().collect();
    let comp_amount = tx.comparison_amount();
    ranked.sort_by(|a, b| {
        let delta_a = (comp_amount - a.gl_amount).abs();
        let delta_b = (comp_amount - b.gl_amount).abs();
        delta_a.cmp(&delta_b).then_with(|| {
            let date_a = (tx.occurred_at - a.gl_date).num_seconds().abs();
            let date_b = (tx.occurred_at - b.gl_date).num_seconds().abs();
            date_a.cmp(&date_b)
        })
    });
    ranked.into_iter().take(limit).cloned().collect()
}
