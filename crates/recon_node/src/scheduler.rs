//! Drives the cadences named in §4.10: the ingestion sweep and orchestrator batches on the tick
//! period derived from `scheduler.cron` (§4.10, see [`crate::cadence`]), the learning poll on its
//! own, independently configured interval, and the Slack daily digest at a configured local hour
//! (§6). Each runs as its own loop rather than a single combined ticker, so a slow learning poll
//! never delays ingestion.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use recon_model::EntityKey;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::cadence::{next_daily_digest_delay, tick_period_for};
use crate::wiring::Node;

/// Runs the scheduler's four loops until `shutdown` reports `true`, then returns once every
/// loop has observed the signal and stopped starting new work (§4.10 "drains in-flight leases
/// ... before the process exits" — in-flight batches are allowed to finish under their own
/// deadline rather than being aborted mid-flight).
pub async fn run(node: Arc<Node>, shutdown: watch::Receiver<bool>) {
    let in_flight_entities: Arc<Mutex<HashSet<EntityKey>>> = Arc::new(Mutex::new(HashSet::new()));
    let digest = Arc::new(Mutex::new(DigestCounters::default()));

    let ingestion = tokio::spawn(ingestion_loop(node.clone(), shutdown.clone(), digest.clone()));
    let orchestration =
        tokio::spawn(orchestration_loop(node.clone(), shutdown.clone(), in_flight_entities, digest.clone()));
    let learning = tokio::spawn(learning_loop(node.clone(), shutdown.clone()));
    let digest_loop = tokio::spawn(digest_loop(node.clone(), shutdown.clone(), digest));

    let _ = tokio::join!(ingestion, orchestration, learning, digest_loop);
}

/// Accumulates the day's activity between digest posts (§6 "daily digest at 09:00 local time").
#[derive(Default)]
struct DigestCounters {
    syncs: usize,
    upserted: usize,
    quarantined: usize,
    batches: usize,
    submitted: usize,
    unmatched: usize,
}

impl DigestCounters {
    fn summary(&self) -> String {
        format!(
            "{} syncs ({} upserted, {} quarantined), {} batches ({} submitted, {} unmatched)",
            self.syncs, self.upserted, self.quarantined, self.batches, self.submitted, self.unmatched
        )
    }
}

async fn digest_loop(node: Arc<Node>, mut shutdown: watch::Receiver<bool>, counters: Arc<Mutex<DigestCounters>>) {
    loop {
        let delay = next_daily_digest_delay(node.config.slack.daily_digest_local_hour);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let summary = { let mut guard = counters.lock().await; let s = guard.summary(); *guard = DigestCounters::default(); s };
                node.slack.daily_digest(&summary).await;
            }
            _ = shutdown.changed() => if *shutdown.borrow() { break },
        }
    }
    info!("digest loop stopped");
}

async fn ingestion_loop(node: Arc<Node>, mut shutdown: watch::Receiver<bool>, digest: Arc<Mutex<DigestCounters>>) {
    let period = tick_period_for(&node.config.scheduler.cron);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => run_ingestion_sweep(&node, &digest).await,
            _ = shutdown.changed() => if *shutdown.borrow() { break },
        }
    }
    info!("ingestion loop stopped");
}

async fn run_ingestion_sweep(node: &Node, digest: &Arc<Mutex<DigestCounters>>) {
    node.directory.reload();
    let targets = match node.discover_sync_targets().await {
        Ok(targets) => targets,
        Err(e) => {
            warn!(error = %e, "failed to discover sync targets, skipping this tick");
            return;
        }
    };
    for target in targets {
        match node
            .ingestor
            .sync_one(&target.profile_id, &target.balance_id, &target.currency, &target.entity)
            .await
        {
            Ok(Some(outcome)) => {
                info!(
                    profile_id = %outcome.profile_id,
                    currency = %outcome.currency,
                    upserted = outcome.upserted,
                    quarantined = outcome.quarantined,
                    "ingestion sync complete"
                );
                metrics::counter!("recon_ingestion_upserted_total").increment(outcome.upserted as u64);
                metrics::counter!("recon_ingestion_quarantined_total").increment(outcome.quarantined as u64);
                {
                    let mut guard = digest.lock().await;
                    guard.syncs += 1;
                    guard.upserted += outcome.upserted;
                    guard.quarantined += outcome.quarantined;
                }
                node.slack
                    .discrepancy_alert(target.profile_id.as_str(), &target.currency, outcome.quarantined)
                    .await;
            }
            Ok(None) => debug_skip(&target.profile_id, &target.currency),
            Err(e) => {
                warn!(profile_id = %target.profile_id, currency = %target.currency, error = %e, "ingestion sync failed")
            }
        }
    }
}

fn debug_skip(profile_id: &recon_model::ProfileId, currency: &str) {
    tracing::debug!(profile_id = %profile_id, currency, "cursor already held by another worker, skipping");
}

async fn orchestration_loop(
    node: Arc<Node>,
    mut shutdown: watch::Receiver<bool>,
    in_flight: Arc<Mutex<HashSet<EntityKey>>>,
    digest: Arc<Mutex<DigestCounters>>,
) {
    let period = tick_period_for(&node.config.scheduler.cron);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => run_orchestrator_batches(&node, &in_flight, &digest).await,
            _ = shutdown.changed() => if *shutdown.borrow() { break },
        }
    }
    info!("orchestrator loop stopped");
}

/// One tick's worth of per-entity batches, bounded to `worker_pool.size` concurrent batches and
/// skipping any entity whose previous batch from an earlier tick hasn't finished yet (§4.7
/// "single-leader per entity", enforced here since `Orchestrator` itself is stateless across
/// calls).
async fn run_orchestrator_batches(
    node: &Arc<Node>,
    in_flight: &Arc<Mutex<HashSet<EntityKey>>>,
    digest: &Arc<Mutex<DigestCounters>>,
) {
    let entities = node.directory.current();
    let semaphore = Arc::new(tokio::sync::Semaphore::new(node.config.worker_pool.size));
    let deadline = Duration::from_secs(node.config.batch.deadline_secs);

    let mut handles = Vec::new();
    for entity in entities.iter().cloned() {
        {
            let mut guard = in_flight.lock().await;
            if !guard.insert(entity.key.clone()) {
                tracing::debug!(entity = %entity.key, "previous batch still running, skipping this tick");
                continue;
            }
        }

        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        let entities = entities.clone();
        let node = node.clone();
        let in_flight = in_flight.clone();
        let digest = digest.clone();

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            let key = entity.key.clone();
            let result =
                tokio::time::timeout(deadline, node.orchestrator.run_for_entity(&entity, &entities)).await;
            match result {
                Ok(Ok(outcome)) => {
                    info!(
                        entity = %outcome.entity,
                        scanned = outcome.scanned,
                        submitted = outcome.submitted,
                        unmatched = outcome.unmatched,
                        emission_failed = outcome.emission_failed,
                        lease_conflicts = outcome.lease_conflicts,
                        "batch complete"
                    );
                    metrics::counter!("recon_batch_scanned_total").increment(outcome.scanned as u64);
                    metrics::counter!("recon_batch_submitted_total").increment(outcome.submitted as u64);
                    metrics::counter!("recon_batch_lease_conflicts_total").increment(outcome.lease_conflicts as u64);
                    {
                        let mut guard = digest.lock().await;
                        guard.batches += 1;
                        guard.submitted += outcome.submitted;
                        guard.unmatched += outcome.unmatched;
                    }
                    node.slack.batch_summary(&outcome).await;
                }
                Ok(Err(e)) => warn!(entity = %entity.display_name, error = %e, "batch failed"),
                Err(_) => warn!(entity = %entity.display_name, "batch exceeded its deadline, abandoning"),
            }
            in_flight.lock().await.remove(&key);
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

async fn learning_loop(node: Arc<Node>, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(node.config.scheduler.learning_poll_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => run_learning_poll(&node).await,
            _ = shutdown.changed() => if *shutdown.borrow() { break },
        }
    }
    info!("learning loop stopped");
}

async fn run_learning_poll(node: &Node) {
    match node.learning.poll().await {
        Ok(outcome) => info!(
            scanned = outcome.scanned,
            patterns_created = outcome.patterns_created,
            patterns_reinforced = outcome.patterns_reinforced,
            rejections_applied = outcome.rejections_applied,
            promoted = outcome.promoted,
            deactivated = outcome.deactivated,
            skipped_unreviewable = outcome.skipped_unreviewable,
            "learning poll complete"
        ),
        Err(e) => warn!(error = %e, "learning poll failed"),
    }
}
