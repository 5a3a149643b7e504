//! Typed, validated, layered configuration for every tunable enumerated in §6: `Default` impls
//! hold the baked-in defaults, an optional config file overrides them, environment variables
//! override the file, and cross-field invariants (e.g. `tx.deadline < batch.deadline`) are
//! enforced centrally by [`RconConfig::validate`] rather than scattered across call sites
//! (§4.11).
//!
//! No CLI/schema-pointer machinery is included (no `clap` dependency, no param-path dumping) —
//! just typed defaults, file/env overlay, and centralized validation. See DESIGN.md.

pub mod secrets;

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use secrets::Sensitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: String, source: std::io::Error },
    #[error("config file {path} is not valid JSON: {source}")]
    ParseFile { path: String, source: serde_json::Error },
    #[error("environment variable {key} could not be applied: {reason}")]
    BadEnvValue { key: String, reason: String },
    #[error("failed to assemble typed config: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("config validation failed: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BatchConfig {
    pub max_tx_per_run: usize,
    pub deadline_secs: u64,
    pub tx_deadline_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_tx_per_run: 500, deadline_secs: 1800, tx_deadline_secs: 300 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BankConfig {
    pub base_url: String,
    #[validate(range(min = 0.01, max = 50.0))]
    pub rate_per_sec: f64,
    pub session_ttl_secs: u64,
    pub bearer_token: Sensitive<String>,
    pub private_key_pem: Sensitive<String>,
    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_cap_delay_ms: u64,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.transferwise.com".into(),
            rate_per_sec: 1.0,
            session_ttl_secs: 300,
            bearer_token: Sensitive::default(),
            private_key_pem: Sensitive::default(),
            max_retry_attempts: 5,
            retry_base_delay_ms: 500,
            retry_cap_delay_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GlConfig {
    pub cache_ttl_secs: u64,
}

impl Default for GlConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: 600 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MatchConfig {
    pub date_window_days: i64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub fuzzy_similarity_min: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { date_window_days: 7, fuzzy_similarity_min: 0.85 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PatternConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity_min: f64,
    pub embedding_dimension: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self { similarity_min: 0.85, embedding_dimension: 1536 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cron: String,
    pub learning_poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { cron: "0 */3 * * *".into(), learning_poll_interval_secs: 60 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LeaseConfig {
    pub ttl_secs: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self { ttl_secs: 120 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WorkerPoolConfig {
    #[validate(range(min = 1, max = 256))]
    pub size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { size: 8 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ApprovalServiceConfig {
    pub base_url: String,
    pub api_key: Sensitive<String>,
}

impl Default for ApprovalServiceConfig {
    fn default() -> Self {
        Self { base_url: "https://approvals.internal".into(), api_key: Sensitive::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SlackConfig {
    pub webhook_url: Option<Sensitive<String>>,
    pub quarantine_alert_threshold: u32,
    pub daily_digest_local_hour: u32,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self { webhook_url: None, quarantine_alert_threshold: 5, daily_digest_local_hour: 9 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub model_id: String,
    pub prompt_template_version: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model_id: "recon-llm-matcher-v1".into(),
            prompt_template_version: "llm-matcher-prompt-v1".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EmbedderConfig {
    pub endpoint: Option<String>,
    pub dimension: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self { endpoint: None, dimension: 1536 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Path to a JSON file holding the `EntityMap` rows (§3 "loaded from the process
    /// configuration layer, never hard-coded"). `None` starts the process with an empty
    /// directory, which the intercompany classifier treats as "nothing known yet".
    pub entities_path: Option<String>,
    pub reload_interval_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { entities_path: None, reload_interval_secs: 300 }
    }
}

/// The full configuration tree. Every tunable named in spec §6 is a field somewhere under this
/// root; cross-field invariants are checked by [`validate_deadlines`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RconConfig {
    #[validate(nested)]
    pub batch: BatchConfig,
    #[validate(nested)]
    pub bank: BankConfig,
    #[validate(nested)]
    pub gl: GlConfig,
    #[validate(nested)]
    pub r#match: MatchConfig,
    #[validate(nested)]
    pub pattern: PatternConfig,
    #[validate(nested)]
    pub scheduler: SchedulerConfig,
    #[validate(nested)]
    pub lease: LeaseConfig,
    #[validate(nested)]
    pub worker_pool: WorkerPoolConfig,
    #[validate(nested)]
    pub approval: ApprovalServiceConfig,
    #[validate(nested)]
    pub slack: SlackConfig,
    #[validate(nested)]
    pub llm: LlmConfig,
    #[validate(nested)]
    pub embedder: EmbedderConfig,
    #[validate(nested)]
    pub directory: DirectoryConfig,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            bank: BankConfig::default(),
            gl: GlConfig::default(),
            r#match: MatchConfig::default(),
            pattern: PatternConfig::default(),
            scheduler: SchedulerConfig::default(),
            lease: LeaseConfig::default(),
            worker_pool: WorkerPoolConfig::default(),
            approval: ApprovalServiceConfig::default(),
            slack: SlackConfig::default(),
            llm: LlmConfig::default(),
            embedder: EmbedderConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

fn validate_deadlines(config: &RconConfig) -> Result<(), ValidationError> {
    if config.batch.tx_deadline_secs >= config.batch.deadline_secs {
        let mut err = ValidationError::new("tx_deadline_must_be_shorter_than_batch_deadline");
        err.message = Some("batch.tx_deadline_secs must be < batch.deadline_secs".into());
        return Err(err);
    }
    Ok(())
}

impl RconConfig {
    pub fn bank_base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.bank.base_url)
    }

    pub fn approval_base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.approval.base_url)
    }

    /// Field-level validation (via the `Validate` derive) plus the cross-field invariant from
    /// §4.11 (`tx.deadline < batch.deadline`), which the derive macro cannot express on its own.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        Validate::validate(self)?;
        if let Err(field_error) = validate_deadlines(self) {
            let mut errors = ValidationErrors::new();
            errors.add("batch", field_error);
            return Err(errors);
        }
        Ok(())
    }

    /// Load layered config: baked-in [`Default`], optionally overridden by a JSON file, then by
    /// `RECON_`-prefixed environment variables using `__` as the nesting separator (e.g.
    /// `RECON_BATCH__MAX_TX_PER_RUN=250`). No CLI-args layer (out of scope per §1: no CLI parsing
    /// in this crate).
    pub fn load(file_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut value = serde_json::to_value(Self::default())?;

        if let Some(path) = file_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|source| ConfigError::ReadFile { path: path.display().to_string(), source })?;
            let file_value: Value = serde_json::from_str(&contents)
                .map_err(|source| ConfigError::ParseFile { path: path.display().to_string(), source })?;
            merge_json(&mut value, file_value);
        }

        apply_env_overrides(&mut value, "RECON")?;

        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Describe every tunable and its current value, for an operator `--describe-config`-style
    /// dump (secrets redact via their `Sensitive<T>` `Serialize` impl).
    pub fn describe(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        let value = serde_json::to_value(self).expect("RconConfig always serializes");
        flatten_json("", &value, &mut out);
        out
    }
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

fn apply_env_overrides(value: &mut Value, prefix: &str) -> Result<(), ConfigError> {
    let env_prefix = format!("{prefix}_");
    for (key, raw) in env::vars() {
        let Some(path) = key.strip_prefix(&env_prefix) else { continue };
        let segments: Vec<String> = path.split("__").map(|s| s.to_lowercase()).collect();
        set_by_path(value, &segments, &raw).map_err(|reason| ConfigError::BadEnvValue { key, reason })?;
    }
    Ok(())
}

fn set_by_path(value: &mut Value, segments: &[String], raw: &str) -> Result<(), String> {
    let Some((head, rest)) = segments.split_first() else {
        return Err("empty env var path".to_string());
    };
    let Value::Object(map) = value else {
        return Err("expected object while applying env override".to_string());
    };
    if rest.is_empty() {
        let existing = map.get(head);
        map.insert(head.clone(), coerce_scalar(raw, existing));
        Ok(())
    } else {
        let entry = map.entry(head.clone()).or_insert_with(|| Value::Object(Default::default()));
        set_by_path(entry, rest, raw)
    }
}

/// Parse an env var string into the same JSON shape as the field it overrides, falling back to
/// a bare JSON string when the existing value gives no hint (or is itself a string).
fn coerce_scalar(raw: &str, existing: Option<&Value>) -> Value {
    match existing {
        Some(Value::Number(_)) => {
            if let Ok(i) = raw.parse::<i64>() {
                return Value::from(i);
            }
            if let Ok(f) = raw.parse::<f64>() {
                return Value::from(f);
            }
            Value::String(raw.to_string())
        }
        Some(Value::Bool(_)) => match raw.parse::<bool>() {
            Ok(b) => Value::Bool(b),
            Err(_) => Value::String(raw.to_string()),
        },
        Some(Value::Null) | None => Value::String(raw.to_string()),
        _ => Value::String(raw.to_string()),
    }
}

fn flatten_json(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                flatten_json(&path, v, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = RconConfig::default();
        assert_eq!(config.batch.max_tx_per_run, 500);
        assert_eq!(config.batch.deadline_secs, 1800);
        assert_eq!(config.batch.tx_deadline_secs, 300);
        assert_eq!(config.gl.cache_ttl_secs, 600);
        assert_eq!(config.bank.session_ttl_secs, 300);
        assert_eq!(config.r#match.date_window_days, 7);
        assert_eq!(config.r#match.fuzzy_similarity_min, 0.85);
        assert_eq!(config.pattern.similarity_min, 0.85);
        assert_eq!(config.lease.ttl_secs, 120);
        assert_eq!(config.worker_pool.size, 8);
        assert_eq!(config.scheduler.learning_poll_interval_secs, 60);
        config.validate().expect("defaults must be valid");
    }

    #[test]
    fn rejects_tx_deadline_not_shorter_than_batch_deadline() {
        let mut config = RconConfig::default();
        config.batch.tx_deadline_secs = config.batch.deadline_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_overlay_overrides_defaults() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"batch": {{"max_tx_per_run": 250}}}}"#).expect("write");
        let config = RconConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.batch.max_tx_per_run, 250);
        assert_eq!(config.batch.deadline_secs, 1800);
    }

    #[test]
    fn env_overlay_overrides_file_and_defaults() {
        // SAFETY: test-only env mutation, scoped to this process and restored immediately.
        unsafe {
            env::set_var("RECON_BATCH__MAX_TX_PER_RUN", "77");
        }
        let config = RconConfig::load(None).expect("load");
        unsafe {
            env::remove_var("RECON_BATCH__MAX_TX_PER_RUN");
        }
        assert_eq!(config.batch.max_tx_per_run, 77);
    }

    #[test]
    fn describe_flattens_and_redacts_secrets() {
        let mut config = RconConfig::default();
        config.bank.bearer_token = Sensitive::new("super-secret".to_string());
        let described = config.describe();
        assert_eq!(described.get("batch.max_tx_per_run"), Some(&Value::from(500)));
        assert_eq!(described.get("bank.bearer_token"), Some(&Value::from("<<redacted>>")));
    }
}
