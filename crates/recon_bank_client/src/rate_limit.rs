use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use recon_model::ProfileId;

type Limiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Per-profile token-bucket, default `bank.rate_per_sec` (§5, §6). One bucket per profile so a
/// slow profile never starves another's throughput.
#[derive(Clone)]
pub struct ProfileRateLimiter {
    rate_per_sec: f64,
    buckets: Arc<DashMap<ProfileId, Arc<Limiter>>>,
}

impl ProfileRateLimiter {
    pub fn new(rate_per_sec: f64) -> Self {
        Self { rate_per_sec, buckets: Arc::new(DashMap::new()) }
    }

    fn bucket_for(&self, profile_id: &ProfileId) -> Arc<Limiter> {
        self.buckets
            .entry(profile_id.clone())
            .or_insert_with(|| {
                let per_sec = self.rate_per_sec.max(1.0).round() as u32;
                let quota = Quota::per_second(NonZeroU32::new(per_sec.max(1)).expect("nonzero"));
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }

    /// Block until a token is available for `profile_id`.
    pub async fn acquire(&self, profile_id: &ProfileId) {
        self.bucket_for(profile_id).until_ready().await;
    }
}
