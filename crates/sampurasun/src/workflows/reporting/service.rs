use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::aggregate::{
    aggregate, monthly_trend, DashboardSummary, MonthlyVisitors, StakeholderStatusView,
};
use super::classifier::CompliancePolicy;
use super::domain::{
    Notification, PeriodFilter, Report, ReportId, ReportScope, ReportSubmission, ReportingPeriod,
    StakeholderId,
};
use super::export::{render_csv, ExportError};
use super::identity::CallerIdentity;
use super::store::{ReportStore, StoreError};
use super::validation::{SubmissionGuard, ValidationError};

static REPORT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_report_id() -> ReportId {
    let id = REPORT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ReportId(format!("rpt-{id:06}"))
}

/// Request-path facade over the store: dashboard, export and intake.
pub struct ReportingService<S> {
    store: Arc<S>,
    policy: CompliancePolicy,
    guard: SubmissionGuard,
}

impl<S> ReportingService<S>
where
    S: ReportStore + 'static,
{
    pub fn new(store: Arc<S>, policy: CompliancePolicy) -> Self {
        Self {
            store,
            policy,
            guard: SubmissionGuard,
        }
    }

    pub fn policy(&self) -> &CompliancePolicy {
        &self.policy
    }

    /// Aggregates every report and classifies every stakeholder as of `now`.
    pub fn dashboard_summary(
        &self,
        caller: &CallerIdentity,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, ReportingError> {
        let rows = self.store.reports(ReportScope::All)?;
        let totals = aggregate(rows.iter().map(|row| &row.report));

        let stakeholders = self.store.stakeholders()?;
        let mut views = Vec::with_capacity(stakeholders.len());
        for stakeholder in &stakeholders {
            let latest = self
                .store
                .latest_submission(&stakeholder.id)
                .map_err(|err| ReportingError::for_stakeholder(err, &stakeholder.id))?;
            views.push(StakeholderStatusView::classify(
                stakeholder,
                latest,
                &self.policy,
                now,
            ));
        }

        info!(
            caller = %caller.subject,
            stakeholders = views.len(),
            reports = totals.report_count,
            "dashboard summary assembled"
        );
        Ok(DashboardSummary::assemble(totals, views, now))
    }

    pub fn monthly_trend(&self, scope: ReportScope) -> Result<Vec<MonthlyVisitors>, ReportingError> {
        let rows = self.store.reports(scope)?;
        Ok(monthly_trend(rows.iter().map(|row| &row.report)))
    }

    /// Renders the CSV export for `filter`, resolved against `now`'s calendar date.
    pub fn export(
        &self,
        caller: &CallerIdentity,
        filter: PeriodFilter,
        now: DateTime<Utc>,
    ) -> Result<ExportArtifact, ReportingError> {
        let scope = filter.scope(now.date_naive());
        let rows = self.store.reports(scope)?;
        let body = render_csv(&rows)?;

        info!(
            caller = %caller.subject,
            period = filter.as_str(),
            rows = rows.len(),
            "report export generated"
        );
        Ok(ExportArtifact {
            filename: filter.export_filename(),
            rows: rows.len(),
            body,
        })
    }

    /// Validates and stores a submission. A second report for the same
    /// stakeholder and period is rejected, never replaced.
    pub fn submit(
        &self,
        submission: ReportSubmission,
        now: DateTime<Utc>,
    ) -> Result<Report, ReportingError> {
        let validated = self.guard.validate(&submission, now)?;

        let known = self
            .store
            .stakeholder(&submission.stakeholder_id)
            .map_err(|err| ReportingError::for_stakeholder(err, &submission.stakeholder_id))?;
        if known.is_none() {
            return Err(ReportingError::NotFound(submission.stakeholder_id));
        }

        let report = Report {
            id: next_report_id(),
            stakeholder_id: submission.stakeholder_id.clone(),
            period: validated.period,
            figures: validated.figures,
            submitted_at: now,
        };

        match self.store.create_report(report) {
            Ok(stored) => {
                info!(
                    stakeholder = %stored.stakeholder_id,
                    period = %stored.period,
                    report_id = %stored.id.0,
                    "report submitted"
                );
                Ok(stored)
            }
            Err(StoreError::Conflict) => {
                debug!(
                    stakeholder = %submission.stakeholder_id,
                    period = %validated.period,
                    "duplicate report rejected"
                );
                Err(ReportingError::DuplicateReport {
                    stakeholder_id: submission.stakeholder_id,
                    period: validated.period,
                })
            }
            Err(other) => Err(ReportingError::for_stakeholder(
                other,
                &submission.stakeholder_id,
            )),
        }
    }

    /// Status card for a single stakeholder's own dashboard.
    pub fn stakeholder_status(
        &self,
        id: &StakeholderId,
        now: DateTime<Utc>,
    ) -> Result<StakeholderStatusCard, ReportingError> {
        let lookup = |err| ReportingError::for_stakeholder(err, id);
        let stakeholder = self
            .store
            .stakeholder(id)
            .map_err(lookup)?
            .ok_or_else(|| ReportingError::NotFound(id.clone()))?;
        let latest = self.store.latest_submission(id).map_err(lookup)?;
        let current_period = ReportingPeriod::current(now);
        let current_period_reported = self
            .store
            .report_exists(id, current_period)
            .map_err(lookup)?;
        Ok(StakeholderStatusCard {
            stakeholder: StakeholderStatusView::classify(&stakeholder, latest, &self.policy, now),
            current_period,
            current_period_reported,
        })
    }

    pub fn notifications(&self, id: &StakeholderId) -> Result<Vec<Notification>, ReportingError> {
        let lookup = |err| ReportingError::for_stakeholder(err, id);
        if self.store.stakeholder(id).map_err(lookup)?.is_none() {
            return Err(ReportingError::NotFound(id.clone()));
        }
        self.store.notifications_for(id).map_err(lookup)
    }
}

/// Rendered export plus the suggested download name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub rows: usize,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeholderStatusCard {
    #[serde(flatten)]
    pub stakeholder: StakeholderStatusView,
    pub current_period: ReportingPeriod,
    pub current_period_reported: bool,
}

/// Error raised by the reporting service.
#[derive(Debug, thiserror::Error)]
pub enum ReportingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a report for {stakeholder_id} covering {period} already exists")]
    DuplicateReport {
        stakeholder_id: StakeholderId,
        period: ReportingPeriod,
    },
    #[error("unknown stakeholder {0}")]
    NotFound(StakeholderId),
    #[error("report store unavailable: {0}")]
    StoreUnavailable(String),
    /// Store answer that has no meaning for the operation that received it.
    #[error("unexpected report store response: {0}")]
    Store(StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ReportingError {
    /// Maps a store error raised while handling one stakeholder's records.
    pub fn for_stakeholder(err: StoreError, id: &StakeholderId) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound(id.clone()),
            other => other.into(),
        }
    }
}

impl From<StoreError> for ReportingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            other => Self::Store(other),
        }
    }
}
