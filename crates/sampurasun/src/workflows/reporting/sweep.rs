//! Daily reminder sweep.
//!
//! [`ComplianceSweep`] scans every stakeholder once and appends a reminder
//! for each one without a report for the current calendar month.
//! [`SweepScheduler`] fires it once a day at a fixed UTC time until shutdown.
//!
//! Only one sweep runs at a time per process. A trigger that arrives while a
//! run is in progress returns [`SweepOutcome::Skipped`] instead of queueing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::domain::{Notification, NotificationId, ReportingPeriod, StakeholderId};
use super::store::ReportStore;

static NOTIFICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_notification_id() -> NotificationId {
    let id = NOTIFICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    NotificationId(format!("ntf-{id:06}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepState {
    Idle,
    Running,
}

/// Counters for one completed sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub period: ReportingPeriod,
    pub scanned: usize,
    pub already_reported: usize,
    pub notified: Vec<StakeholderId>,
    /// Stakeholders whose lookup or notification write failed this run.
    pub failed: Vec<StakeholderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Another sweep held the run slot.
    Skipped,
    Completed(SweepSummary),
    /// The stakeholder listing could not be read; retried on the next tick.
    Unavailable { reason: String },
}

/// Single-flight reminder sweep over the report store.
pub struct ComplianceSweep<S> {
    store: Arc<S>,
    message: String,
    running: AtomicBool,
}

impl<S> ComplianceSweep<S>
where
    S: ReportStore + 'static,
{
    pub fn new(store: Arc<S>, message: impl Into<String>) -> Self {
        Self {
            store,
            message: message.into(),
            running: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SweepState {
        if self.running.load(Ordering::Acquire) {
            SweepState::Running
        } else {
            SweepState::Idle
        }
    }

    pub(crate) fn try_begin(&self) -> Option<RunSlot<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunSlot {
                running: &self.running,
            })
    }

    /// Runs one sweep for the calendar month containing `now`.
    pub fn run_once(&self, now: DateTime<Utc>) -> SweepOutcome {
        let Some(_slot) = self.try_begin() else {
            info!("compliance sweep already running, skipping trigger");
            return SweepOutcome::Skipped;
        };

        self.sweep(now)
    }

    fn sweep(&self, now: DateTime<Utc>) -> SweepOutcome {
        let period = ReportingPeriod::current(now);
        info!(%period, "compliance sweep started");

        let stakeholders = match self.store.stakeholders() {
            Ok(stakeholders) => stakeholders,
            Err(err) => {
                error!(%period, error = %err, "compliance sweep could not list stakeholders");
                return SweepOutcome::Unavailable {
                    reason: err.to_string(),
                };
            }
        };

        let mut summary = SweepSummary {
            period,
            scanned: stakeholders.len(),
            already_reported: 0,
            notified: Vec::new(),
            failed: Vec::new(),
        };

        for stakeholder in stakeholders {
            match self.store.report_exists(&stakeholder.id, period) {
                Ok(true) => {
                    summary.already_reported += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(stakeholder = %stakeholder.id, error = %err, "report lookup failed");
                    summary.failed.push(stakeholder.id);
                    continue;
                }
            }

            let notification = Notification {
                id: next_notification_id(),
                stakeholder_id: stakeholder.id.clone(),
                message: self.message.clone(),
                created_at: now,
            };

            match self.store.create_notification(notification) {
                Ok(()) => {
                    debug!(stakeholder = %stakeholder.id, "reminder queued");
                    summary.notified.push(stakeholder.id);
                }
                Err(err) => {
                    warn!(stakeholder = %stakeholder.id, error = %err, "reminder write failed");
                    summary.failed.push(stakeholder.id);
                }
            }
        }

        info!(
            %period,
            scanned = summary.scanned,
            already_reported = summary.already_reported,
            notified = summary.notified.len(),
            failed = summary.failed.len(),
            "compliance sweep finished"
        );
        SweepOutcome::Completed(summary)
    }
}

/// Holds the sweep's Running state; dropping it returns the sweep to Idle.
pub(crate) struct RunSlot<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Fixed UTC time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|at| Self { at })
    }

    /// First scheduled instant strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = Utc.from_utc_datetime(&now.date_naive().and_time(self.at));
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

/// Fires a [`ComplianceSweep`] on a [`DailySchedule`].
pub struct SweepScheduler<S> {
    sweep: Arc<ComplianceSweep<S>>,
    schedule: DailySchedule,
}

impl<S> SweepScheduler<S>
where
    S: ReportStore + 'static,
{
    pub fn new(sweep: Arc<ComplianceSweep<S>>, schedule: DailySchedule) -> Self {
        Self { sweep, schedule }
    }

    /// Starts one sweep on the blocking pool without waiting for it.
    pub fn trigger(&self) -> JoinHandle<SweepOutcome> {
        let sweep = Arc::clone(&self.sweep);
        tokio::task::spawn_blocking(move || sweep.run_once(Utc::now()))
    }

    /// [`trigger`](Self::trigger) with the join awaited on a detached task.
    /// A run that panics is logged and yields `None`.
    pub fn trigger_supervised(&self) -> JoinHandle<Option<SweepOutcome>> {
        let run = self.trigger();
        tokio::spawn(async move {
            match run.await {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    error!(error = %err, panicked = err.is_panic(), "compliance sweep task failed");
                    None
                }
            }
        })
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Ticks never wait on the previous run, so a sweep that outlasts a full
    /// day makes the next tick come back as skipped.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(schedule = %self.schedule.at, "compliance sweep scheduler starting");

        let mut anchor = Utc::now();
        loop {
            let next = self.schedule.next_run_after(anchor);
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            debug!(next_run = %next, "next compliance sweep scheduled");

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("compliance sweep scheduler shutting down");
                    break;
                }

                _ = tokio::time::sleep(wait) => {
                    self.trigger_supervised();
                    anchor = next.max(Utc::now());
                }
            }
        }
    }
}
