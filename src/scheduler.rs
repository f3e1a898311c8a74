// src/scheduler.rs
//! Wall-clock trigger loop: two daily curation runs plus one daily cache cleanup,
//! all interpreted in the configured fixed UTC offset.
//!
//! A single task owns the curator, so a cleanup can never overlap a cycle.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, Utc};
use metrics::gauge;

use crate::config::ScheduleConfig;
use crate::curator::Curator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Curate,
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    pub at: NaiveTime,
    pub job: Job,
}

/// Morning run, afternoon run, cleanup; equal times resolve in that order.
pub fn triggers(cfg: &ScheduleConfig) -> Vec<DailyTrigger> {
    vec![
        DailyTrigger {
            at: cfg.morning_run,
            job: Job::Curate,
        },
        DailyTrigger {
            at: cfg.afternoon_run,
            job: Job::Curate,
        },
        DailyTrigger {
            at: cfg.cleanup_time,
            job: Job::Cleanup,
        },
    ]
}

/// Next strictly-future firing of `at` after `now`, in `now`'s offset.
pub fn next_occurrence(now: DateTime<FixedOffset>, at: NaiveTime) -> Option<DateTime<FixedOffset>> {
    let offset = *now.offset();
    let today = now.date_naive().and_time(at).and_local_timezone(offset).single()?;
    if today > now {
        Some(today)
    } else {
        Some(today + ChronoDuration::days(1))
    }
}

/// Earliest upcoming trigger. Ties go to the earlier entry in `triggers`.
pub fn next_due(
    now: DateTime<FixedOffset>,
    triggers: &[DailyTrigger],
) -> Option<(DateTime<FixedOffset>, Job)> {
    let mut best: Option<(DateTime<FixedOffset>, Job)> = None;
    for t in triggers {
        let Some(when) = next_occurrence(now, t.at) else {
            continue;
        };
        if best.map_or(true, |(b, _)| when < b) {
            best = Some((when, t.job));
        }
    }
    best
}

/// Next trigger strictly after both the clock and the last firing. A sleep that
/// wakes a little early must not fire the same trigger twice.
pub fn next_after(
    now: DateTime<FixedOffset>,
    last_fired: Option<DateTime<FixedOffset>>,
    triggers: &[DailyTrigger],
) -> Option<(DateTime<FixedOffset>, Job)> {
    let reference = last_fired.map_or(now, |fired| fired.max(now));
    next_due(reference, triggers)
}

/// Run one job against the curator. Failures are logged; the loop keeps going.
pub async fn run_job(curator: &mut Curator, job: Job) {
    match job {
        Job::Curate => {
            if let Err(e) = curator.run_cycle().await {
                tracing::error!(error = %e, "curation run failed");
            }
        }
        Job::Cleanup => {
            curator.cleanup_cache();
        }
    }
}

/// Sleep until each trigger and run it, forever.
pub async fn run_schedule(mut curator: Curator) {
    let schedule = curator.config().schedule;
    let list = triggers(&schedule);

    tracing::info!(
        morning = %schedule.morning_run.format("%H:%M"),
        afternoon = %schedule.afternoon_run.format("%H:%M"),
        cleanup = %schedule.cleanup_time.format("%H:%M"),
        offset = %schedule.utc_offset,
        "schedule armed"
    );

    let mut last_fired = None;
    loop {
        let now = Utc::now().with_timezone(&schedule.utc_offset);
        let Some((when, job)) = next_after(now, last_fired, &list) else {
            tracing::error!("no resolvable trigger time, retrying in an hour");
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            continue;
        };

        gauge!("curator_next_run_ts").set(when.timestamp() as f64);
        tracing::info!(next = %when.to_rfc3339(), ?job, "waiting for next trigger");
        let wait = (when - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        last_fired = Some(when);
        run_job(&mut curator, job).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc_dt(h: u32, m: u32) -> DateTime<FixedOffset> {
        let off = FixedOffset::east_opt(0).unwrap();
        off.with_ymd_and_hms(2025, 1, 6, h, m, 0).unwrap()
    }

    #[test]
    fn early_wakeup_does_not_refire_the_same_trigger() {
        let list = triggers(&ScheduleConfig::default());
        let fired = utc_dt(6, 0);
        // the sleep returned 10ms before the 06:00 cleanup it was waiting for
        let woke = fired - ChronoDuration::milliseconds(10);

        assert_eq!(next_due(woke, &list), Some((fired, Job::Cleanup)));
        assert_eq!(next_after(woke, Some(fired), &list), Some((utc_dt(14, 0), Job::Curate)));
    }

    #[test]
    fn late_wakeup_still_uses_the_clock() {
        let list = triggers(&ScheduleConfig::default());
        // a long cycle ran past the afternoon trigger
        let (when, job) = next_after(utc_dt(20, 30), Some(utc_dt(14, 0)), &list).unwrap();
        assert_eq!(job, Job::Cleanup);
        assert_eq!(when, utc_dt(6, 0) + ChronoDuration::days(1));

        assert_eq!(next_after(utc_dt(10, 0), None, &list), next_due(utc_dt(10, 0), &list));
    }

    #[test]
    fn picks_the_nearest_trigger_today() {
        let list = triggers(&ScheduleConfig::default());
        let (when, job) = next_due(utc_dt(10, 0), &list).unwrap();
        assert_eq!(job, Job::Curate);
        assert_eq!(when, utc_dt(14, 0));
    }

    #[test]
    fn rolls_over_to_tomorrow_cleanup() {
        let list = triggers(&ScheduleConfig::default());
        let (when, job) = next_due(utc_dt(21, 0), &list).unwrap();
        assert_eq!(job, Job::Cleanup);
        assert_eq!(when, utc_dt(6, 0) + ChronoDuration::days(1));
    }

    #[test]
    fn exact_trigger_time_is_not_refired() {
        let when = next_occurrence(utc_dt(14, 0), at(14, 0)).unwrap();
        assert_eq!(when, utc_dt(14, 0) + ChronoDuration::days(1));
    }

    #[test]
    fn offset_is_respected() {
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = est.with_ymd_and_hms(2025, 1, 6, 8, 30, 0).unwrap();
        let when = next_occurrence(now, at(9, 0)).unwrap();
        assert_eq!(when.with_timezone(&Utc).format("%H:%M").to_string(), "14:00");
    }
}
