use chrono::{DateTime, Utc};

use super::domain::{
    Notification, Report, ReportRow, ReportScope, ReportingPeriod, Stakeholder, StakeholderId,
};

/// Storage contract the engine needs from the persistence layer.
///
/// Implementations must make `create_report` an insert-if-absent on
/// `(stakeholder_id, period)`: concurrent submissions for the same month
/// resolve to one stored report and one [`StoreError::Conflict`].
pub trait ReportStore: Send + Sync {
    fn stakeholders(&self) -> Result<Vec<Stakeholder>, StoreError>;
    fn stakeholder(&self, id: &StakeholderId) -> Result<Option<Stakeholder>, StoreError>;
    fn latest_submission(&self, id: &StakeholderId)
        -> Result<Option<DateTime<Utc>>, StoreError>;
    /// Rows ordered by period, then stakeholder name.
    fn reports(&self, scope: ReportScope) -> Result<Vec<ReportRow>, StoreError>;
    fn report_exists(
        &self,
        id: &StakeholderId,
        period: ReportingPeriod,
    ) -> Result<bool, StoreError>;
    fn create_report(&self, report: Report) -> Result<Report, StoreError>;
    fn create_notification(&self, notification: Notification) -> Result<(), StoreError>;
    fn notifications_for(&self, id: &StakeholderId) -> Result<Vec<Notification>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
