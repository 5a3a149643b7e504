//! Slack webhook emission (§6 "fire-and-forget"): batch summaries, discrepancy alerts, and the
//! daily digest trigger. Only the trigger contract is implemented, per scope — message
//! formatting beyond a plain text summary is left to the operator's webhook-side template.

use std::sync::Arc;

use recon_config::secrets::Sensitive;
use recon_orchestrator::BatchOutcome;
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
struct SlackPayload {
    text: String,
}

/// Posts fire-and-forget notifications to a configured Slack incoming webhook. A `None`
/// `webhook_url` makes every call a no-op, so a deployment without Slack wired up doesn't need
/// to special-case the call sites.
#[derive(Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: Option<Arc<Sensitive<String>>>,
    quarantine_alert_threshold: u32,
}

impl SlackNotifier {
    pub fn new(http: reqwest::Client, webhook_url: Option<Sensitive<String>>, quarantine_alert_threshold: u32) -> Self {
        Self { http, webhook_url: webhook_url.map(Arc::new), quarantine_alert_threshold }
    }

    async fn post(&self, text: String) {
        let Some(webhook_url) = &self.webhook_url else { return };
        let result = self
            .http
            .post(webhook_url.expose_secret())
            .json(&SlackPayload { text })
            .send()
            .await;
        if let Err(e) = result {
            warn!(error = %e, "slack webhook post failed");
        }
    }

    /// §6 "batch summary (counts by status)".
    pub async fn batch_summary(&self, outcome: &BatchOutcome) {
        self.post(format!(
            "batch complete for {}: scanned={} submitted={} unmatched={} emission_failed={} lease_conflicts={}",
            outcome.entity, outcome.scanned, outcome.submitted, outcome.unmatched, outcome.emission_failed, outcome.lease_conflicts
        ))
        .await;
    }

    /// §6 "discrepancy alerts (over threshold or large amount)". Triggered by the scheduler when
    /// a sync run's quarantine count clears `quarantine_alert_threshold` (§4.12 "quarantined-record
    /// counts").
    pub async fn discrepancy_alert(&self, profile_id: &str, currency: &str, quarantined: usize) {
        if (quarantined as u32) < self.quarantine_alert_threshold {
            return;
        }
        self.post(format!(
            "discrepancy alert: {quarantined} quarantined rows for profile {profile_id} ({currency}), threshold is {}",
            self.quarantine_alert_threshold
        ))
        .await;
    }

    /// §6 "daily digest at 09:00 local time". The scheduler decides when local time crosses
    /// `slack.daily_digest_local_hour`; this just fires the message.
    pub async fn daily_digest(&self, summary: &str) {
        self.post(format!("daily digest: {summary}")).await;
    }
}
