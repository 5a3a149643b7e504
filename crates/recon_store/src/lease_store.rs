use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use recon_model::Reference;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// A worker's claim on scoring one [`recon_model::BankTransaction`] (§5 ordering guarantees,
/// GLOSSARY "Lease"). Expiry allows another worker to retake; the retaker must re-read
/// `attempts` before trusting its own result, which is why leases carry no scoring state
/// themselves — they only gate access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaseToken(pub Uuid);

struct LeaseRow {
    token: LeaseToken,
    expires_at: DateTime<Utc>,
}

/// Per-tx lease with TTL, enforcing "no two workers score the same tx concurrently" (§5).
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Acquire the lease if unheld or expired as of `now`. Returns [`StoreError::LeaseConflict`]
    /// if another worker holds a live lease.
    async fn acquire(&self, reference: &Reference, ttl: Duration, now: DateTime<Utc>) -> StoreResult<LeaseToken>;

    /// Release a held lease. A mismatched token (stale holder) is a no-op, not an error, since
    /// by definition the lease has already moved on.
    async fn release(&self, reference: &Reference, token: LeaseToken);

    async fn is_held(&self, reference: &Reference, now: DateTime<Utc>) -> bool;
}

#[derive(Default)]
pub struct InMemoryLeaseStore {
    rows: DashMap<Reference, LeaseRow>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn acquire(&self, reference: &Reference, ttl: Duration, now: DateTime<Utc>) -> StoreResult<LeaseToken> {
        if let Some(existing) = self.rows.get(reference) {
            if existing.expires_at > now {
                return Err(StoreError::LeaseConflict(reference.to_string()));
            }
        }
        let token = LeaseToken(Uuid::new_v4());
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StoreError::Backend(format!("invalid lease ttl: {e}")))?;
        self.rows.insert(reference.clone(), LeaseRow { token, expires_at });
        Ok(token)
    }

    async fn release(&self, reference: &Reference, token: LeaseToken) {
        if let Some(existing) = self.rows.get(reference) {
            if existing.token != token {
                return;
            }
        } else {
            return;
        }
        self.rows.remove(reference);
    }

    async fn is_held(&self, reference: &Reference, now: DateTime<Utc>) -> bool {
        self.rows.get(reference).map(|r| r.expires_at > now).unwrap_or(false)
    }
}
