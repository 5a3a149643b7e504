use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use recon_model::ProfileId;
use tokio::sync::Mutex;

/// An established SCA session for one profile, valid for `session.ttl` (§4.1 step 4).
#[derive(Clone, Debug)]
pub struct Session {
    pub ott: String,
    pub signature_b64: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Process-wide, per-profile SCA session cache (§4.1 "The session cache is keyed by
/// `profile_id`"; §9 "global state": a scoped resource created once and handed to the client by
/// reference, not a true global). A per-profile async [`Mutex`] coalesces concurrent handshake
/// attempts so only one caller actually talks to the bank while others await the winner (§5).
#[derive(Clone, Default)]
pub struct SessionCache {
    sessions: Arc<DashMap<ProfileId, Session>>,
    handshake_locks: Arc<DashMap<ProfileId, Arc<Mutex<()>>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_live(&self, profile_id: &ProfileId, now: DateTime<Utc>) -> Option<Session> {
        self.sessions.get(profile_id).filter(|s| s.is_live(now)).map(|s| s.clone())
    }

    pub fn put(&self, profile_id: ProfileId, session: Session) {
        self.sessions.insert(profile_id, session);
    }

    pub fn invalidate(&self, profile_id: &ProfileId) {
        self.sessions.remove(profile_id);
    }

    /// The per-profile lock callers must hold while performing the handshake, so concurrent
    /// callers coalesce onto one in-flight handshake instead of each re-signing an OTT.
    pub fn handshake_lock(&self, profile_id: &ProfileId) -> Arc<Mutex<()>> {
        self.handshake_locks.entry(profile_id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expires_at_ttl_boundary() {
        let now = Utc::now();
        let session =
            Session { ott: "ott".into(), signature_b64: "sig".into(), expires_at: now + chrono::Duration::seconds(300) };
        assert!(session.is_live(now));
        assert!(!session.is_live(now + chrono::Duration::seconds(301)));
    }

    #[test]
    fn cache_returns_none_once_expired() {
        let cache = SessionCache::new();
        let profile: ProfileId = "p-1".into();
        let now = Utc::now();
        cache.put(
            profile.clone(),
            Session { ott: "ott".into(), signature_b64: "sig".into(), expires_at: now + chrono::Duration::seconds(1) },
        );
        assert!(cache.get_live(&profile, now).is_some());
        assert!(cache.get_live(&profile, now + chrono::Duration::seconds(2)).is_none());
    }
}
