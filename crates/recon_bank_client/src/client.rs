use std::time::Duration;

use chrono::{DateTime, Utc};
use recon_config::secrets::Sensitive;
use recon_model::{BalanceId, CurrencyCode, ProfileId};
use recon_time::SharedClock;
use reqwest::{header, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use tracing::{debug, warn};
use url::Url;

use crate::error::{BankError, BankResult};
use crate::rate_limit::ProfileRateLimiter;
use crate::session::{Session, SessionCache};
use crate::signing::sign_ott;
use crate::types::{Balance, Profile, Statement};

/// `end - start` may not exceed this many days before the bank API rejects the window with
/// `RangeTooLarge` (§4.1).
pub const MAX_STATEMENT_WINDOW_DAYS: i64 = 469;

const OTT_HEADER: &str = "x-2fa-approval";
const SIGNATURE_HEADER: &str = "X-Signature";

/// Authenticated client for the bank API (C1): profile/balance listing and statement fetches,
/// including the stateful two-step SCA handshake (§4.1). Holds its session cache and rate
/// limiter as scoped resources rather than process globals (§9 "global state").
#[derive(Clone)]
pub struct BankClient {
    http: ClientWithMiddleware,
    base_url: Url,
    bearer_token: Sensitive<String>,
    private_key_pem: Sensitive<String>,
    sessions: SessionCache,
    rate_limiter: ProfileRateLimiter,
    clock: SharedClock,
    session_ttl: Duration,
}

impl BankClient {
    pub fn new(
        base_url: Url,
        bearer_token: Sensitive<String>,
        private_key_pem: Sensitive<String>,
        rate_per_sec: f64,
        session_ttl: Duration,
        max_retry_attempts: u32,
        retry_base_delay: Duration,
        retry_cap_delay: Duration,
        clock: SharedClock,
    ) -> Self {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(retry_base_delay, retry_cap_delay)
            .build_with_max_retries(max_retry_attempts);
        let http = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self {
            http,
            base_url,
            bearer_token,
            private_key_pem,
            sessions: SessionCache::new(),
            rate_limiter: ProfileRateLimiter::new(rate_per_sec),
            clock,
            session_ttl,
        }
    }

    /// `GET /v2/profiles` (§6). Token-only, no SCA handshake.
    pub async fn list_profiles(&self) -> BankResult<Vec<Profile>> {
        let url = self.base_url.join("v2/profiles").expect("static path joins base url");
        let response = self.bearer_request(url).send().await?;
        decode_json(response).await
    }

    /// `GET /v4/profiles/{id}/balances?types=STANDARD` (§6). Token-only.
    pub async fn list_balances(&self, profile_id: &ProfileId) -> BankResult<Vec<Balance>> {
        let mut url = self
            .base_url
            .join(&format!("v4/profiles/{}/balances", profile_id.as_str()))
            .map_err(|e| BankError::Validation(e.to_string()))?;
        url.query_pairs_mut().append_pair("types", "STANDARD");
        let response = self.bearer_request(url).send().await?;
        decode_json(response).await
    }

    /// `GET /v1/profiles/{id}/balance-statements/{balanceId}/statement.json` (§6), behind the
    /// two-step SCA handshake (§4.1).
    pub async fn get_statement(
        &self,
        profile_id: &ProfileId,
        balance_id: &BalanceId,
        currency: &CurrencyCode,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BankResult<Statement> {
        if (end - start).num_days() > MAX_STATEMENT_WINDOW_DAYS {
            return Err(BankError::RangeTooLarge);
        }
        if self.bearer_token.expose_secret().is_empty() || self.private_key_pem.expose_secret().is_empty() {
            return Err(BankError::AuthRequired);
        }

        let mut url = self
            .base_url
            .join(&format!("v1/profiles/{}/balance-statements/{}/statement.json", profile_id.as_str(), balance_id.as_str()))
            .map_err(|e| BankError::Validation(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("currency", currency)
            .append_pair("intervalStart", &start.to_rfc3339())
            .append_pair("intervalEnd", &end.to_rfc3339())
            .append_pair("type", "COMPACT");

        let response = self.fetch_with_sca(profile_id, url).await?;
        decode_json(response).await
    }

    fn bearer_request(&self, url: Url) -> reqwest_middleware::RequestBuilder {
        self.http.get(url).header(header::AUTHORIZATION, format!("Bearer {}", self.bearer_token.expose_secret()))
    }

    /// Issue `url` under the two-step handshake (§4.1): reuse a live session if cached,
    /// otherwise perform the handshake (coalesced per profile via [`SessionCache::handshake_lock`])
    /// and cache the resulting session for `session_ttl`.
    async fn fetch_with_sca(&self, profile_id: &ProfileId, url: Url) -> BankResult<reqwest::Response> {
        self.rate_limiter.acquire(profile_id).await;

        if let Some(session) = self.sessions.get_live(profile_id, self.clock.now()) {
            let response = self.send_with_session(url.clone(), &session).await?;
            if response.status() != StatusCode::FORBIDDEN {
                return raise_for_fatal_status(response).await;
            }
            debug!(profile_id = %profile_id, "cached bank session rejected, restarting handshake");
            self.sessions.invalidate(profile_id);
        }

        let lock = self.sessions.handshake_lock(profile_id);
        let _guard = lock.lock().await;

        // Another caller may have completed the handshake while we waited for the lock.
        if let Some(session) = self.sessions.get_live(profile_id, self.clock.now()) {
            let response = self.send_with_session(url.clone(), &session).await?;
            return raise_for_fatal_status(response).await;
        }

        debug!(profile_id = %profile_id, "issuing bank request without a session");
        let first = self.bearer_request(url.clone()).send().await?;
        if first.status() != StatusCode::FORBIDDEN {
            return raise_for_fatal_status(first).await;
        }

        let ott = first
            .headers()
            .get(OTT_HEADER)
            .ok_or(BankError::AuthRequired)?
            .to_str()
            .map_err(|e| BankError::SigningFailed(e.to_string()))?
            .to_owned();

        let signature = sign_ott(self.private_key_pem.expose_secret(), ott.as_bytes())?;

        debug!(profile_id = %profile_id, "retrying bank request with signed SCA challenge");
        let retry = self
            .bearer_request(url)
            .header(OTT_HEADER, &ott)
            .header(SIGNATURE_HEADER, &signature)
            .send()
            .await?;

        if !retry.status().is_success() {
            warn!(profile_id = %profile_id, status = %retry.status(), "bank SCA handshake retry failed");
            return raise_for_fatal_status(retry).await;
        }

        let now = self.clock.now();
        self.sessions.put(
            profile_id.clone(),
            Session { ott, signature_b64: signature, expires_at: now + chrono::Duration::from_std(self.session_ttl).expect("ttl fits chrono") },
        );
        Ok(retry)
    }

    async fn send_with_session(&self, url: Url, session: &Session) -> BankResult<reqwest::Response> {
        Ok(self
            .bearer_request(url)
            .header(OTT_HEADER, &session.ott)
            .header(SIGNATURE_HEADER, &session.signature_b64)
            .send()
            .await?)
    }
}

async fn raise_for_fatal_status(response: reqwest::Response) -> BankResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(BankError::Fatal { status, body })
}

async fn decode_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> BankResult<T> {
    let response = raise_for_fatal_status(response).await?;
    response.json::<T>().await.map_err(|e| BankError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use recon_time::FrozenClock;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;

    use super::*;

    fn test_key_pem() -> String {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("generate test key");
        key.to_pkcs8_pem(LineEnding::LF).expect("pem encode").to_string()
    }

    fn client_for(base_url: &str, clock: SharedClock) -> BankClient {
        BankClient::new(
            Url::parse(base_url).unwrap(),
            Sensitive::new("test-token".to_string()),
            Sensitive::new(test_key_pem()),
            1_000.0,
            Duration::from_secs(300),
            2,
            Duration::from_millis(1),
            Duration::from_millis(50),
            clock,
        )
    }

    #[tokio::test]
    async fn list_profiles_requires_only_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v2/profiles")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"[{"id":"p-1","type":"BUSINESS","businessName":"Acme"}]"#)
            .create_async()
            .await;

        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        let client = client_for(&server.url(), clock);
        let profiles = client.list_profiles().await.expect("should succeed");
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, "p-1");
    }

    #[tokio::test]
    async fn statement_window_over_469_days_fails_without_a_request() {
        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        let client = client_for("http://127.0.0.1:1", clock);
        let start = Utc::now();
        let end = start + chrono::Duration::days(470);
        let result = client
            .get_statement(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), start, end)
            .await;
        assert!(matches!(result, Err(BankError::RangeTooLarge)));
    }

    #[tokio::test]
    async fn statement_window_of_exactly_469_days_is_allowed_through() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"transactions":[]}"#)
            .create_async()
            .await;
        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        let client = client_for(&server.url(), clock);
        let start = Utc::now();
        let end = start + chrono::Duration::days(469);
        let statement = client
            .get_statement(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), start, end)
            .await
            .expect("exactly 469 days must succeed");
        assert!(statement.transactions.is_empty());
    }

    #[tokio::test]
    async fn handshake_retries_with_signed_ott_after_first_403() {
        let mut server = mockito::Server::new_async().await;
        let challenge = server
            .mock("GET", Matcher::Any)
            .match_header(OTT_HEADER, Matcher::Missing)
            .with_status(403)
            .with_header(OTT_HEADER, "one-time-token")
            .create_async()
            .await;
        let approved = server
            .mock("GET", Matcher::Any)
            .match_header(OTT_HEADER, "one-time-token")
            .with_status(200)
            .with_body(r#"{"transactions":[]}"#)
            .create_async()
            .await;

        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        let client = client_for(&server.url(), clock);
        let start = Utc::now();
        let end = start + chrono::Duration::days(1);
        client.get_statement(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), start, end).await.expect("handshake should succeed");

        challenge.assert_async().await;
        approved.assert_async().await;
    }

    #[tokio::test]
    async fn second_call_within_session_ttl_skips_the_handshake() {
        let mut server = mockito::Server::new_async().await;
        let challenge = server
            .mock("GET", Matcher::Any)
            .match_header(OTT_HEADER, Matcher::Missing)
            .with_status(403)
            .with_header(OTT_HEADER, "one-time-token")
            .expect(1)
            .create_async()
            .await;
        let approved = server
            .mock("GET", Matcher::Any)
            .match_header(OTT_HEADER, "one-time-token")
            .with_status(200)
            .with_body(r#"{"transactions":[]}"#)
            .expect(2)
            .create_async()
            .await;

        let clock: SharedClock = Arc::new(FrozenClock::at(Utc::now()));
        let client = client_for(&server.url(), clock);
        let start = Utc::now();
        let end = start + chrono::Duration::days(1);
        client.get_statement(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), start, end).await.expect("first call");
        client.get_statement(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), start, end).await.expect("second call reuses session");

        challenge.assert_async().await;
        approved.assert_async().await;
    }
}
