use std::time::Duration;

use chrono::{DateTime, Utc};
use recon_config::secrets::Sensitive;
use recon_gl_cache::{GlEntrySource, GlFetchError, GlFetchResult, GlQuery};
use recon_model::{GlEntry, SuggestionId};
use reqwest::header;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApprovalClientError, ApprovalClientResult};
use crate::types::{
    EnrichmentRequest, GlEntryWire, ListSuggestionsResponse, PatternWire, SubmitBatchRequest,
    SubmitBatchResponse, SubmitSuggestionRequest, SubmitSuggestionResponse, SuggestionDetail,
};

const API_KEY_HEADER: &str = "X-API-Key";

/// Client for the downstream approval service (C8, §4.8, §6). All write operations are
/// idempotent by their natural key: a 409 on resubmission is treated as success and the
/// canonical server-assigned row is read back from the response body (§7 `DuplicateSubmission`).
#[derive(Clone)]
pub struct ApprovalServiceClient {
    http: ClientWithMiddleware,
    base_url: Url,
    api_key: Sensitive<String>,
}

impl ApprovalServiceClient {
    pub fn new(
        base_url: Url,
        api_key: Sensitive<String>,
        max_retry_attempts: u32,
        retry_base_delay: Duration,
        retry_cap_delay: Duration,
    ) -> Self {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(retry_base_delay, retry_cap_delay)
            .build_with_max_retries(max_retry_attempts);
        let http = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self { http, base_url, api_key }
    }

    fn url(&self, path: &str) -> Url {
        self.base_url.join(path).unwrap_or_else(|e| panic!("invalid approval-service path {path}: {e}"))
    }

    fn authed(&self, builder: reqwest_middleware::RequestBuilder) -> reqwest_middleware::RequestBuilder {
        builder.header(API_KEY_HEADER, self.api_key.expose_secret())
    }

    /// `POST /api/recon/suggestions` (§6, §4.7 step 7, §7 `DuplicateSubmission`).
    pub async fn submit_suggestion(
        &self,
        request: &SubmitSuggestionRequest,
    ) -> ApprovalClientResult<SubmitSuggestionResponse> {
        debug!(wise_transaction_id = %request.wise_transaction_id, "submitting suggestion");
        let response =
            self.authed(self.http.post(self.url("api/recon/suggestions")).json(request)).send().await?;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            if status == reqwest::StatusCode::CONFLICT {
                debug!(
                    wise_transaction_id = %request.wise_transaction_id,
                    "duplicate suggestion submission, reading back canonical id"
                );
            }
            return decode_body(response, "submit_suggestion").await;
        }
        bad_status("submit_suggestion", response).await
    }

    /// `POST /api/recon/suggestions/batch` (§6).
    pub async fn submit_batch(
        &self,
        request: &SubmitBatchRequest,
    ) -> ApprovalClientResult<SubmitBatchResponse> {
        let response = self
            .authed(self.http.post(self.url("api/recon/suggestions/batch")).json(request))
            .send()
            .await?;
        if response.status().is_success() {
            return decode_body(response, "submit_batch").await;
        }
        bad_status("submit_batch", response).await
    }

    /// `GET /api/recon/suggestions/{id}` (§6).
    pub async fn get_suggestion(&self, id: &SuggestionId) -> ApprovalClientResult<SuggestionDetail> {
        let response = self
            .authed(self.http.get(self.url(&format!("api/recon/suggestions/{id}"))))
            .send()
            .await?;
        if response.status().is_success() {
            return decode_body(response, "get_suggestion").await;
        }
        bad_status("get_suggestion", response).await
    }

    /// `GET /api/recon/suggestions?reviewed_since=...` (§6, §4.9 poll cursor): suggestions
    /// reviewed strictly after `since` (pass `None` on the very first poll to fetch the full
    /// backlog). Ordering is left to the server; the learning loop tolerates any order since it
    /// dedupes on `(suggestion_id, reviewed_at)` and advances its own watermark to the maximum
    /// `reviewed_at` it observes.
    pub async fn list_reviewed_suggestions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> ApprovalClientResult<Vec<SuggestionDetail>> {
        let mut url = self.url("api/recon/suggestions");
        if let Some(since) = since {
            url.query_pairs_mut().append_pair("reviewed_since", &since.to_rfc3339());
        }
        let response = self.authed(self.http.get(url)).send().await?;
        if response.status().is_success() {
            let body: ListSuggestionsResponse = decode_body(response, "list_reviewed_suggestions").await?;
            return Ok(body.suggestions);
        }
        bad_status("list_reviewed_suggestions", response).await
    }

    /// `GET/POST /api/recon/patterns` (§6).
    pub async fn list_patterns(&self) -> ApprovalClientResult<Vec<PatternWire>> {
        let response = self.authed(self.http.get(self.url("api/recon/patterns"))).send().await?;
        if response.status().is_success() {
            return decode_body(response, "list_patterns").await;
        }
        bad_status("list_patterns", response).await
    }

    pub async fn create_pattern(&self, pattern: &PatternWire) -> ApprovalClientResult<PatternWire> {
        let response =
            self.authed(self.http.post(self.url("api/recon/patterns")).json(pattern)).send().await?;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            return decode_body(response, "create_pattern").await;
        }
        bad_status("create_pattern", response).await
    }

    /// `POST /api/recon/enrich` (§6).
    pub async fn enrich(&self, request: &EnrichmentRequest) -> ApprovalClientResult<()> {
        let response = self.authed(self.http.post(self.url("api/recon/enrich")).json(request)).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        bad_status("enrich", response).await
    }
}

#[async_trait::async_trait]
impl GlEntrySource for ApprovalServiceClient {
    /// `GET /api/recon/gl-entries` (§6), the sibling API the GL cache falls through to on a
    /// miss (§4.3).
    async fn get_gl_entries(&self, query: &GlQuery) -> GlFetchResult<Vec<GlEntry>> {
        let mut url = self.url("api/recon/gl-entries");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("subsidiary_id", query.subsidiary_id.as_str());
            pairs.append_pair("start_date", &query.start_date.to_rfc3339());
            pairs.append_pair("end_date", &query.end_date.to_rfc3339());
            pairs.append_pair("unreconciled_only", &query.unreconciled_only.to_string());
            for account_type in &query.account_types {
                pairs.append_pair("account_types", &account_type.to_string());
            }
        }
        let response = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(|e| GlFetchError::Source(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GlFetchError::Source(format!("get_gl_entries status {}", response.status())));
        }
        let wire: Vec<GlEntryWire> =
            response.json().await.map_err(|e| GlFetchError::Source(e.to_string()))?;
        Ok(wire.into_iter().map(GlEntryWire::into_entry).collect())
    }
}

async fn decode_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
) -> ApprovalClientResult<T> {
    response.json::<T>().await.map_err(|e| {
        warn!(operation, "failed to decode approval-service response: {e}");
        ApprovalClientError::Validation(e.to_string())
    })
}

async fn bad_status<T>(operation: &'static str, response: reqwest::Response) -> ApprovalClientResult<T> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(operation, %status, "approval service returned a non-retryable status");
    Err(ApprovalClientError::BadStatus { operation, status, body })
}
