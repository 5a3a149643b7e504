//! Per-(profile, currency) incremental sync loop (C2, §4.2).

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use recon_bank_client::BankClient;
use recon_model::{BalanceId, CurrencyCode, ProfileId, SyncCursor};
use recon_store::{CursorKey, CursorStore, StoreError, TransactionStore};
use recon_time::SharedClock;
use tracing::{info, warn};

use crate::error::{IngestionError, IngestionResult};
use crate::mapping::map_transaction;

/// Retroactive-posting overlap applied to the cursor's watermark before each fetch (§4.2 step 3).
pub const SYNC_OVERLAP: ChronoDuration = ChronoDuration::days(2);

/// Outcome of one sync attempt for a single (profile, currency), for batch-level reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub profile_id: ProfileId,
    pub currency: CurrencyCode,
    pub upserted: usize,
    pub quarantined: usize,
}

/// Wires the bank client and stores together to run one incremental sync (§4.2).
pub struct Ingestor {
    bank: BankClient,
    cursors: Arc<dyn CursorStore>,
    transactions: Arc<dyn TransactionStore>,
    clock: SharedClock,
}

impl Ingestor {
    pub fn new(
        bank: BankClient,
        cursors: Arc<dyn CursorStore>,
        transactions: Arc<dyn TransactionStore>,
        clock: SharedClock,
    ) -> Self {
        Self { bank, cursors, transactions, clock }
    }

    /// Run steps 1-6 of §4.2 for a single (profile, currency, balance, entity). Skips (returns
    /// `Ok(None)`) if another worker already holds the cursor.
    pub async fn sync_one(
        &self,
        profile_id: &ProfileId,
        balance_id: &BalanceId,
        currency: &CurrencyCode,
        entity: &str,
    ) -> IngestionResult<Option<SyncOutcome>> {
        let key: CursorKey = (profile_id.clone(), currency.clone());
        let now = self.clock.now();
        self.cursors
            .get_or_init(key.clone(), SyncCursor::new(profile_id.clone(), currency.clone(), balance_id.clone(), now))
            .await?;

        let cursor = match self.cursors.try_acquire(&key).await {
            Ok(cursor) => cursor,
            Err(StoreError::AlreadySyncing(_)) => {
                info!(%profile_id, currency, "cursor already syncing, skipping this run");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let window_start = cursor.last_end_date - SYNC_OVERLAP;
        match self.run_window(profile_id, balance_id, currency, entity, window_start, now).await {
            Ok(outcome) => {
                self.cursors.complete(&key, now, now).await?;
                Ok(Some(outcome))
            }
            Err(e) => {
                warn!(%profile_id, currency, error = %e, "ingestion run failed, cursor left at last good watermark");
                self.cursors.fail(&key, e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn run_window(
        &self,
        profile_id: &ProfileId,
        balance_id: &BalanceId,
        currency: &CurrencyCode,
        entity: &str,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> IngestionResult<SyncOutcome> {
        let statement = self.bank.get_statement(profile_id, balance_id, currency, start, end).await?;
        let mut upserted = 0;
        let mut quarantined = 0;
        for row in statement.transactions {
            match map_transaction(profile_id, entity, row) {
                Ok(tx) => {
                    self.transactions.upsert(tx).await?;
                    upserted += 1;
                }
                Err(IngestionError::Validation(reason)) => {
                    warn!(%profile_id, currency, reason, "quarantining statement row");
                    quarantined += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(SyncOutcome { profile_id: profile_id.clone(), currency: currency.clone(), upserted, quarantined })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use recon_config::secrets::Sensitive;
    use recon_store::{InMemoryCursorStore, InMemoryTransactionStore};
    use recon_time::FrozenClock;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;
    use url::Url;

    use super::*;

    fn test_key_pem() -> String {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("generate test key");
        key.to_pkcs8_pem(LineEnding::LF).expect("pem encode").to_string()
    }

    fn bank_client(base_url: &str, clock: SharedClock) -> BankClient {
        BankClient::new(
            Url::parse(base_url).unwrap(),
            Sensitive::new("test-token".to_string()),
            Sensitive::new(test_key_pem()),
            1_000.0,
            Duration::from_secs(300),
            2,
            Duration::from_millis(1),
            Duration::from_millis(20),
            clock,
        )
    }

    #[tokio::test]
    async fn s6_replaying_the_same_window_is_idempotent() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"transactions":[{"reference":"TRANSFER-100","direction":"CREDIT","type":"TRANSFER","date":"2025-03-10T00:00:00Z","amount":"1234.56","currency":"EUR","description":"inv","paymentReference":"INV-7788","counterpartyName":"Acme","counterpartyAccount":null,"fx":null,"fees":null,"card":null,"runningBalance":null}]}"#,
            )
            .create_async()
            .await;

        let clock: SharedClock = std::sync::Arc::new(FrozenClock::at(chrono::Utc::now()));
        let ingestor = Ingestor::new(
            bank_client(&server.url(), clock.clone()),
            Arc::new(InMemoryCursorStore::new()),
            Arc::new(InMemoryTransactionStore::new()),
            clock,
        );

        let outcome1 = ingestor
            .sync_one(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), "Acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome1.upserted, 1);

        let outcome2 = ingestor
            .sync_one(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), "Acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome2.upserted, 1);
        assert_eq!(outcome2.quarantined, 0);
    }

    #[tokio::test]
    async fn malformed_row_is_quarantined_without_failing_the_batch() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"transactions":[{"reference":"BAD-1","direction":"SIDEWAYS","type":"TRANSFER","date":"2025-03-10T00:00:00Z","amount":"1.00","currency":"EUR","description":"x","paymentReference":null,"counterpartyName":null,"counterpartyAccount":null,"fx":null,"fees":null,"card":null,"runningBalance":null}]}"#,
            )
            .create_async()
            .await;
        let clock: SharedClock = std::sync::Arc::new(FrozenClock::at(chrono::Utc::now()));
        let ingestor = Ingestor::new(
            bank_client(&server.url(), clock.clone()),
            Arc::new(InMemoryCursorStore::new()),
            Arc::new(InMemoryTransactionStore::new()),
            clock,
        );
        let outcome = ingestor
            .sync_one(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), "Acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.upserted, 0);
        assert_eq!(outcome.quarantined, 1);
    }

    #[tokio::test]
    async fn second_concurrent_sync_skips_while_first_holds_the_cursor() {
        let clock: SharedClock = std::sync::Arc::new(FrozenClock::at(chrono::Utc::now()));
        let cursors = Arc::new(InMemoryCursorStore::new());
        let key: CursorKey = ("p-1".into(), "EUR".to_string());
        cursors
            .get_or_init(key.clone(), SyncCursor::new("p-1".into(), "EUR".to_string(), "bal-1".into(), clock.now()))
            .await
            .unwrap();
        cursors.try_acquire(&key).await.unwrap();

        let ingestor = Ingestor::new(
            bank_client("http://127.0.0.1:1", clock.clone()),
            cursors,
            Arc::new(InMemoryTransactionStore::new()),
            clock,
        );
        let outcome = ingestor.sync_one(&"p-1".into(), &"bal-1".into(), &"EUR".to_string(), "Acme").await.unwrap();
        assert!(outcome.is_none());
    }
}
