//! GL Fetcher (C3): a windowed pull of candidate GL entries from the approval service's sibling
//! API, fronted by a short-TTL advisory cache (§4.3). The cache is best-effort (Redis-style): a
//! miss always falls through to the source, and nothing depends on an entry surviving.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use recon_model::{GlAccountType, GlEntry, SubsidiaryId};
use recon_time::SharedClock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlFetchError {
    #[error("GL source request failed: {0}")]
    Source(String),
}

pub type GlFetchResult<T> = Result<T, GlFetchError>;

/// A single GL-entries window query (§4.3, §6 wire contract).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlQuery {
    pub subsidiary_id: SubsidiaryId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub account_types: Vec<GlAccountType>,
    pub unreconciled_only: bool,
}

/// The sibling API the cache falls through to on a miss. Implemented by
/// `recon_approval_client::ApprovalServiceClient`.
#[async_trait]
pub trait GlEntrySource: Send + Sync {
    async fn get_gl_entries(&self, query: &GlQuery) -> GlFetchResult<Vec<GlEntry>>;
}

struct CacheRow {
    entries: Vec<GlEntry>,
    expires_at: DateTime<Utc>,
}

/// Caches [`GlEntrySource::get_gl_entries`] results under the query tuple for `ttl` (default
/// `gl.cache_ttl` = 10 minutes, §4.3/§6). Concurrent callers for the same key may both miss and
/// both fetch; the cache does not coalesce in-flight fetches, since it's advisory and
/// best-effort rather than a source of truth.
pub struct GlFetcher {
    source: Arc<dyn GlEntrySource>,
    cache: DashMap<GlQuery, CacheRow>,
    ttl: Duration,
    clock: SharedClock,
}

impl GlFetcher {
    pub fn new(source: Arc<dyn GlEntrySource>, ttl: Duration, clock: SharedClock) -> Self {
        Self { source, cache: DashMap::new(), ttl, clock }
    }

    pub async fn get_gl_entries(&self, query: GlQuery) -> GlFetchResult<Vec<GlEntry>> {
        let now = self.clock.now();
        if let Some(row) = self.cache.get(&query) {
            if row.expires_at > now {
                tracing::debug!(subsidiary_id = %query.subsidiary_id, "GL cache hit");
                return Ok(row.entries.clone());
            }
        }
        tracing::debug!(subsidiary_id = %query.subsidiary_id, "GL cache miss, fetching from source");
        let entries = self.source.get_gl_entries(&query).await?;
        let expires_at = now
            + chrono::Duration::from_std(self.ttl).map_err(|e| GlFetchError::Source(e.to_string()))?;
        self.cache.insert(query, CacheRow { entries: entries.clone(), expires_at });
        Ok(entries)
    }

    /// Drop everything cached so far, regardless of TTL. Used by tests and by an operator who
    /// wants to force a refresh.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use recon_time::FrozenClock;

    use super::*;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GlEntrySource for CountingSource {
        async fn get_gl_entries(&self, _query: &GlQuery) -> GlFetchResult<Vec<GlEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    fn query() -> GlQuery {
        GlQuery {
            subsidiary_id: "sub-1".into(),
            start_date: Utc::now(),
            end_date: Utc::now(),
            account_types: vec![GlAccountType::Bank],
            unreconciled_only: true,
        }
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_a_cache_hit() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let clock = Arc::new(FrozenClock::at(Utc::now()));
        let fetcher = GlFetcher::new(source.clone(), Duration::from_secs(600), clock.clone());

        fetcher.get_gl_entries(query()).await.unwrap();
        fetcher.get_gl_entries(query()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
        let clock = Arc::new(FrozenClock::at(Utc::now()));
        let fetcher = GlFetcher::new(source.clone(), Duration::from_secs(600), clock.clone());

        fetcher.get_gl_entries(query()).await.unwrap();
        clock.advance(chrono::Duration::seconds(601));
        fetcher.get_gl_entries(query()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
