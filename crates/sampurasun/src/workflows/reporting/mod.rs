//! Stakeholder reporting: intake, compliance classification, dashboard
//! aggregation, CSV export and the daily reminder sweep.
//!
//! The store is reached only through [`ReportStore`]; everything else in
//! this module works on values fetched from it.

pub mod aggregate;
pub mod classifier;
pub mod domain;
pub mod export;
pub mod identity;
pub mod router;
pub mod service;
pub mod store;
pub mod sweep;
pub mod validation;

#[cfg(test)]
mod tests;

pub use aggregate::{
    aggregate, monthly_trend, DashboardSummary, MonthlyVisitors, ReportAggregate,
    StakeholderStatusView, StatusCounts,
};
pub use classifier::{CompliancePolicy, ComplianceStatus};
pub use domain::{
    Notification, NotificationId, PeriodFilter, Report, ReportFigures, ReportId, ReportRow,
    ReportScope, ReportSubmission, ReportingPeriod, Stakeholder, StakeholderId, StakeholderType,
    SubmittedFigures, UnknownPeriodFilter, REPORTING_EPOCH_YEAR,
};
pub use export::{render_csv, ExportError, EXPORT_HEADER};
pub use identity::{CallerIdentity, IdentityResolver};
pub use router::{reporting_router, ReportingApi};
pub use service::{ExportArtifact, ReportingError, ReportingService, StakeholderStatusCard};
pub use store::{ReportStore, StoreError};
pub use sweep::{
    ComplianceSweep, DailySchedule, SweepOutcome, SweepScheduler, SweepState, SweepSummary,
};
pub use validation::{SubmissionGuard, ValidationError};
