//! Derives a fixed tick period from `scheduler.cron` at startup (§4.10: "the reference port does
//! not embed a cron-expression parser; it derives a fixed tick period from the configured
//! cadence ... and logs the resolved period").
//!
//! Only the `*/N` step form of the hour field is recognized, since that's the only shape the
//! default (`0 */3 * * *`) and any sane ingestion cadence actually need. Anything else falls
//! back to [`DEFAULT_TICK`] with a warning, rather than failing startup over a scheduling detail.

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_TICK: Duration = Duration::from_secs(3 * 3600);

/// Parse the hour field of a five-field cron expression (`minute hour dom month dow`) as either
/// a literal hour-of-day or a `*/N` step, and return the implied tick period.
pub fn tick_period_for(cron: &str) -> Duration {
    let Some(hour_field) = cron.split_whitespace().nth(1) else {
        warn!(cron, "scheduler.cron has no hour field, using default tick period");
        return DEFAULT_TICK;
    };

    if let Some(step) = hour_field.strip_prefix("*/") {
        if let Ok(hours) = step.parse::<u64>() {
            if hours > 0 {
                return Duration::from_secs(hours * 3600);
            }
        }
    }

    warn!(cron, "scheduler.cron hour field is not a */N step, using default tick period");
    DEFAULT_TICK
}

/// Seconds until the next wall-clock instant where the local hour equals `target_hour`
/// (§6 "daily digest at 09:00 local time"). Always positive; a `target_hour` equal to the
/// current hour rolls to the same time tomorrow rather than firing immediately.
pub fn next_daily_digest_delay(target_hour: u32) -> Duration {
    use chrono::{Datelike, Local, TimeZone};

    let now = Local::now();
    let today = now
        .timezone()
        .with_ymd_and_hms(now.year(), now.month(), now.day(), target_hour.min(23), 0, 0)
        .single();
    let next = match today {
        Some(t) if t > now => t,
        Some(t) => t + chrono::Duration::days(1),
        None => now + chrono::Duration::days(1),
    };
    (next - now).to_std().unwrap_or(Duration::from_secs(86400))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn every_three_hours_resolves_to_a_three_hour_tick() {
        assert_eq!(tick_period_for("0 */3 * * *"), Duration::from_secs(3 * 3600));
    }

    #[test]
    fn every_hour_resolves_to_a_one_hour_tick() {
        assert_eq!(tick_period_for("0 */1 * * *"), Duration::from_secs(3600));
    }

    #[test]
    fn an_unparseable_expression_falls_back_to_the_default() {
        assert_eq!(tick_period_for("garbage"), DEFAULT_TICK);
        assert_eq!(tick_period_for("0 9 * * *"), DEFAULT_TICK);
    }

    #[test]
    fn daily_digest_delay_is_always_within_one_day() {
        for hour in 0..24 {
            let delay = next_daily_digest_delay(hour);
            assert!(delay > Duration::ZERO);
            assert!(delay <= Duration::from_secs(24 * 3600));
        }
    }
}
