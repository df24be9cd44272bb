use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::classifier::{CompliancePolicy, ComplianceStatus};
use super::domain::{Report, ReportingPeriod, Stakeholder, StakeholderId, StakeholderType};

/// Scalar metrics over a set of reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportAggregate {
    pub total_visitors: u64,
    pub domestic_visitors: u64,
    pub foreign_visitors: u64,
    /// Mean occupancy percent, two decimals.
    pub average_occupancy: f64,
    pub average_stay_days: f64,
    pub average_spending: f64,
    pub report_count: usize,
}

/// Sums visitor counts and averages the decimal figures.
///
/// An empty input yields all zeros.
pub fn aggregate<'a, I>(reports: I) -> ReportAggregate
where
    I: IntoIterator<Item = &'a Report>,
{
    let mut domestic: u64 = 0;
    let mut foreign: u64 = 0;
    let mut occupancy = 0.0;
    let mut stay = 0.0;
    let mut spending = 0.0;
    let mut count = 0usize;

    for report in reports {
        domestic = domestic.saturating_add(report.figures.nusantara);
        foreign = foreign.saturating_add(report.figures.mancanegara);
        occupancy += report.figures.occupancy_rate;
        stay += report.figures.average_stay_days;
        spending += report.figures.average_spending;
        count += 1;
    }

    ReportAggregate {
        total_visitors: domestic.saturating_add(foreign),
        domestic_visitors: domestic,
        foreign_visitors: foreign,
        average_occupancy: mean_rounded(occupancy, count),
        average_stay_days: mean_rounded(stay, count),
        average_spending: mean_rounded(spending, count),
        report_count: count,
    }
}

fn mean_rounded(sum: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round2(sum / count as f64)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One stakeholder line on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeholderStatusView {
    pub id: StakeholderId,
    pub name: String,
    #[serde(rename = "type")]
    pub stakeholder_type: StakeholderType,
    pub type_label: &'static str,
    pub status: ComplianceStatus,
    pub status_label: &'static str,
    pub status_colour: &'static str,
    pub latest_submission: Option<DateTime<Utc>>,
}

impl StakeholderStatusView {
    pub fn classify(
        stakeholder: &Stakeholder,
        latest_submission: Option<DateTime<Utc>>,
        policy: &CompliancePolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let status = policy.classify(latest_submission, now);
        Self {
            id: stakeholder.id.clone(),
            name: stakeholder.name.clone(),
            stakeholder_type: stakeholder.stakeholder_type,
            type_label: stakeholder.stakeholder_type.label(),
            status,
            status_label: status.label(),
            status_colour: status.colour(),
            latest_submission,
        }
    }
}

/// Payload behind `GET /api/admin/dashboard`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub generated_at: DateTime<Utc>,
    pub total_visitors: u64,
    pub average_occupancy: f64,
    pub breakdown: ReportAggregate,
    pub status_counts: StatusCounts,
    pub stakeholders: Vec<StakeholderStatusView>,
}

impl DashboardSummary {
    pub fn assemble(
        aggregate: ReportAggregate,
        stakeholders: Vec<StakeholderStatusView>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let status_counts = StatusCounts::tally(&stakeholders);
        Self {
            generated_at,
            total_visitors: aggregate.total_visitors,
            average_occupancy: aggregate.average_occupancy,
            breakdown: aggregate,
            status_counts,
            stakeholders,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub compliant: usize,
    pub overdue: usize,
    pub suspended: usize,
}

impl StatusCounts {
    fn tally(views: &[StakeholderStatusView]) -> Self {
        views.iter().fold(Self::default(), |mut counts, view| {
            match view.status {
                ComplianceStatus::Compliant => counts.compliant += 1,
                ComplianceStatus::Overdue => counts.overdue += 1,
                ComplianceStatus::Suspended => counts.suspended += 1,
            }
            counts
        })
    }
}

/// Visitors reported for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyVisitors {
    pub period: ReportingPeriod,
    pub label: String,
    pub nusantara: u64,
    pub mancanegara: u64,
    pub total: u64,
}

/// Per-month visitor totals, ascending by period.
pub fn monthly_trend<'a, I>(reports: I) -> Vec<MonthlyVisitors>
where
    I: IntoIterator<Item = &'a Report>,
{
    let mut buckets: BTreeMap<ReportingPeriod, (u64, u64)> = BTreeMap::new();
    for report in reports {
        let entry = buckets.entry(report.period).or_default();
        entry.0 = entry.0.saturating_add(report.figures.nusantara);
        entry.1 = entry.1.saturating_add(report.figures.mancanegara);
    }

    buckets
        .into_iter()
        .map(|(period, (nusantara, mancanegara))| MonthlyVisitors {
            period,
            label: period.to_string(),
            nusantara,
            mancanegara,
            total: nusantara.saturating_add(mancanegara),
        })
        .collect()
}
