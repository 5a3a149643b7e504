//! Process wiring (C10, §4.10): builds every long-lived component from a loaded [`RconConfig`].
//!
//! Persistence is the in-memory store family from `recon_store` exclusively; see DESIGN.md for
//! why no durable backend is wired in this port.

use std::sync::Arc;
use std::time::Duration;

use recon_approval_client::ApprovalServiceClient;
use recon_bank_client::{BankClient, BankError, Profile};
use recon_config::{ConfigError, RconConfig};
use recon_gl_cache::{GlEntrySource, GlFetcher};
use recon_ingestion::Ingestor;
use recon_learning::{LearningLoop, ReviewedSuggestionSource};
use recon_matchers::{HttpLlmScorer, LlmError, LlmResponse, LlmResult, LlmScorer, MatcherPipeline};
use recon_model::{BalanceId, BankTransaction, CurrencyCode, Entity, GlEntry, ProfileId};
use recon_orchestrator::{Orchestrator, SuggestionSink};
use recon_patterns::{EmbedError, EmbedResult, Embedder, HttpEmbedder, VectorIndex};
use recon_store::{
    InMemoryCursorStore, InMemoryLearningCursorStore, InMemoryLeaseStore, InMemoryPatternStore,
    InMemoryTransactionStore,
};
use recon_time::{system_clock, SharedClock};
use thiserror::Error;
use url::Url;

use crate::directory::{DirectoryError, EntityDirectory};
use crate::slack::SlackNotifier;

/// The approval service has no dedicated retry knobs in `RconConfig` (§6 only documents the
/// bank client's retry triple); it reuses the bank client's default shape rather than growing a
/// second set of tunables for a policy the source never distinguishes from the bank's.
const APPROVAL_MAX_RETRY_ATTEMPTS: u32 = 5;
const APPROVAL_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const APPROVAL_RETRY_CAP_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum WiringError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid bank.base_url: {0}")]
    BankUrl(url::ParseError),
    #[error("invalid approval.base_url: {0}")]
    ApprovalUrl(url::ParseError),
    #[error("invalid llm.endpoint: {0}")]
    LlmUrl(url::ParseError),
    #[error("invalid embedder.endpoint: {0}")]
    EmbedderUrl(url::ParseError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Stands in for [`Embedder`] when `embedder.endpoint` isn't configured. Every call fails, so
/// the vector index degrades the same way it would against a down provider rather than needing
/// a separate "unconfigured" branch at every call site.
struct NullEmbedder {
    dimension: usize,
}

#[async_trait::async_trait]
impl Embedder for NullEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> EmbedResult<Vec<f32>> {
        Err(EmbedError::Call("no embedder endpoint configured".to_string()))
    }
}

/// Stands in for [`LlmScorer`] when `llm.endpoint` isn't configured. §4.4.3 already discards a
/// failed LLM call rather than propagating it, so an always-failing scorer just keeps the LLM
/// tier permanently in that state.
struct NullLlmScorer;

#[async_trait::async_trait]
impl LlmScorer for NullLlmScorer {
    async fn score(&self, _tx: &BankTransaction, _candidates: &[GlEntry]) -> LlmResult<LlmResponse> {
        Err(LlmError::Call("no llm endpoint configured".to_string()))
    }
}

/// One (profile, balance, currency) pair to sync, paired with the entity it belongs to so the
/// ingestion sweep can report a human-readable name alongside the raw ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncTarget {
    pub profile_id: ProfileId,
    pub balance_id: BalanceId,
    pub currency: CurrencyCode,
    pub entity: String,
}

/// Every component the scheduler drives, built once at startup from [`RconConfig`].
pub struct Node {
    pub config: RconConfig,
    pub clock: SharedClock,
    pub bank: BankClient,
    pub approval: Arc<ApprovalServiceClient>,
    pub ingestor: Ingestor,
    pub orchestrator: Orchestrator,
    pub learning: LearningLoop,
    pub directory: EntityDirectory,
    pub slack: SlackNotifier,
}

impl Node {
    pub fn build(config: RconConfig) -> Result<Self, WiringError> {
        let clock = system_clock();
        let http = reqwest::Client::new();

        let bank = BankClient::new(
            config.bank_base_url().map_err(WiringError::BankUrl)?,
            config.bank.bearer_token.clone(),
            config.bank.private_key_pem.clone(),
            config.bank.rate_per_sec,
            Duration::from_secs(config.bank.session_ttl_secs),
            config.bank.max_retry_attempts,
            Duration::from_millis(config.bank.retry_base_delay_ms),
            Duration::from_millis(config.bank.retry_cap_delay_ms),
            clock.clone(),
        );

        let approval = Arc::new(ApprovalServiceClient::new(
            config.approval_base_url().map_err(WiringError::ApprovalUrl)?,
            config.approval.api_key.clone(),
            APPROVAL_MAX_RETRY_ATTEMPTS,
            APPROVAL_RETRY_BASE_DELAY,
            APPROVAL_RETRY_CAP_DELAY,
        ));

        let gl_source: Arc<dyn GlEntrySource> = approval.clone();
        let gl_fetcher =
            Arc::new(GlFetcher::new(gl_source, Duration::from_secs(config.gl.cache_ttl_secs), clock.clone()));

        let embedder: Arc<dyn Embedder> = match &config.embedder.endpoint {
            Some(endpoint) => {
                let url = Url::parse(endpoint).map_err(WiringError::EmbedderUrl)?;
                Arc::new(HttpEmbedder::new(http.clone(), url, config.embedder.dimension))
            }
            None => Arc::new(NullEmbedder { dimension: config.embedder.dimension }),
        };

        let llm: Arc<dyn LlmScorer> = match &config.llm.endpoint {
            Some(endpoint) => {
                let url = Url::parse(endpoint).map_err(WiringError::LlmUrl)?;
                Arc::new(HttpLlmScorer::new(
                    http.clone(),
                    url,
                    config.llm.model_id.clone(),
                    config.llm.prompt_template_version.clone(),
                ))
            }
            None => Arc::new(NullLlmScorer),
        };

        let transaction_store = Arc::new(InMemoryTransactionStore::new());
        let cursor_store = Arc::new(InMemoryCursorStore::new());
        let pattern_store = Arc::new(InMemoryPatternStore::new());
        let lease_store = Arc::new(InMemoryLeaseStore::new());
        let learning_cursor_store = Arc::new(InMemoryLearningCursorStore::new());
        let vector_index = Arc::new(VectorIndex::new(config.pattern.embedding_dimension));
        let matchers = Arc::new(MatcherPipeline::new(llm));

        let ingestor =
            Ingestor::new(bank.clone(), cursor_store.clone(), transaction_store.clone(), clock.clone());

        let sink: Arc<dyn SuggestionSink> = approval.clone();
        let orchestrator = Orchestrator::new(
            transaction_store.clone(),
            gl_fetcher.clone(),
            matchers.clone(),
            pattern_store.clone(),
            vector_index.clone(),
            embedder.clone(),
            lease_store.clone(),
            sink,
            clock.clone(),
            Duration::from_secs(config.lease.ttl_secs),
            config.batch.max_tx_per_run,
            config.r#match.date_window_days,
        );

        let reviewed_source: Arc<dyn ReviewedSuggestionSource> = approval.clone();
        let learning = LearningLoop::new(
            reviewed_source,
            embedder.clone(),
            vector_index.clone(),
            pattern_store.clone(),
            learning_cursor_store.clone(),
            transaction_store.clone(),
            clock.clone(),
        );

        let directory =
            EntityDirectory::load(config.directory.entities_path.clone().map(std::path::PathBuf::from))?;

        let slack = SlackNotifier::new(http.clone(), config.slack.webhook_url.clone(), config.slack.quarantine_alert_threshold);

        Ok(Self { config, clock, bank, approval, ingestor, orchestrator, learning, directory, slack })
    }

    /// Enumerate every (profile, balance, currency) pair the ingestion sweep should sync this
    /// tick, by cross-referencing the bank's own profile/balance listing against the entity
    /// directory. A balance whose profile isn't in the directory is skipped with a warning: the
    /// orchestrator has nothing to batch for an entity it doesn't know about.
    pub async fn discover_sync_targets(&self) -> Result<Vec<SyncTarget>, BankError> {
        let entities = self.directory.current();
        let profiles: Vec<Profile> = self.bank.list_profiles().await?;
        let mut targets = Vec::new();
        for profile in profiles {
            let profile_id = ProfileId::from(profile.id.clone());
            let Some(entity) = find_entity_for_profile(entities.iter(), &profile_id) else {
                tracing::warn!(profile_id = %profile_id, "bank profile has no matching entity, skipping");
                continue;
            };
            let balances = self.bank.list_balances(&profile_id).await?;
            for balance in balances {
                targets.push(SyncTarget {
                    profile_id: profile_id.clone(),
                    balance_id: BalanceId::from(balance.id),
                    currency: balance.currency,
                    entity: entity.display_name.clone(),
                });
            }
        }
        Ok(targets)
    }
}

fn find_entity_for_profile<'a>(
    entities: impl Iterator<Item = &'a Entity>,
    profile_id: &ProfileId,
) -> Option<&'a Entity> {
    entities.into_iter().find(|e| &e.profile_id == profile_id)
}
