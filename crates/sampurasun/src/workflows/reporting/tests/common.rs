use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::reporting::domain::{
    Notification, Report, ReportFigures, ReportId, ReportRow, ReportScope, ReportSubmission,
    ReportingPeriod, Stakeholder, StakeholderId, StakeholderType, SubmittedFigures,
};
use crate::workflows::reporting::identity::{CallerIdentity, IdentityResolver};
use crate::workflows::reporting::store::{ReportStore, StoreError};
use crate::workflows::reporting::{
    reporting_router, ComplianceSweep, CompliancePolicy, ReportingApi, ReportingService,
};

pub(super) const ADMIN_TOKEN: &str = "dispar-admin-token";
pub(super) const REMINDER: &str = "Harap segera laporkan data bulan ini.";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 2, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 30, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn period(year: i32, month: u32) -> ReportingPeriod {
    ReportingPeriod::new(year, month).expect("valid period")
}

pub(super) fn stakeholder(id: &str, name: &str, stakeholder_type: StakeholderType) -> Stakeholder {
    Stakeholder {
        id: StakeholderId(id.to_string()),
        name: name.to_string(),
        stakeholder_type,
    }
}

pub(super) fn region() -> Vec<Stakeholder> {
    vec![
        stakeholder("hotel-savoy", "Hotel Savoy Homann", StakeholderType::Hotel),
        stakeholder("agency-priangan", "Priangan Tour", StakeholderType::Agency),
        stakeholder("kawah-putih", "Kawah Putih", StakeholderType::Attraction),
    ]
}

pub(super) fn figures(nusantara: u64, mancanegara: u64, occupancy_rate: f64) -> ReportFigures {
    ReportFigures {
        nusantara,
        mancanegara,
        average_stay_days: 2.5,
        occupancy_rate,
        average_spending: 750_000.0,
        dominant_origin: Some("Malaysia".to_string()),
    }
}

pub(super) fn report(
    stakeholder_id: &str,
    period: ReportingPeriod,
    figures: ReportFigures,
    submitted_at: DateTime<Utc>,
) -> Report {
    Report {
        id: ReportId(format!("rpt-{stakeholder_id}-{period}")),
        stakeholder_id: StakeholderId(stakeholder_id.to_string()),
        period,
        figures,
        submitted_at,
    }
}

pub(super) fn submission(stakeholder_id: &str) -> ReportSubmission {
    ReportSubmission {
        stakeholder_id: StakeholderId(stakeholder_id.to_string()),
        period: None,
        figures: SubmittedFigures {
            nusantara: 120,
            mancanegara: 30,
            average_stay_days: 2.5,
            occupancy_rate: 78.5,
            average_spending: 750_000.0,
            dominant_origin: Some("Malaysia".to_string()),
        },
    }
}

#[derive(Default)]
struct MemoryState {
    stakeholders: BTreeMap<StakeholderId, Stakeholder>,
    reports: BTreeMap<(StakeholderId, ReportingPeriod), Report>,
    notifications: Vec<Notification>,
}

/// Mutex-backed store; `create_report` is insert-if-absent under the lock.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub(super) fn with_stakeholders(stakeholders: Vec<Stakeholder>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().expect("store mutex poisoned");
            for stakeholder in stakeholders {
                state.stakeholders.insert(stakeholder.id.clone(), stakeholder);
            }
        }
        store
    }

    pub(super) fn seed_report(&self, report: Report) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state
            .reports
            .insert((report.stakeholder_id.clone(), report.period), report);
    }

    pub(super) fn notifications(&self) -> Vec<Notification> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .notifications
            .clone()
    }

    pub(super) fn report_count(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").reports.len()
    }
}

impl ReportStore for MemoryStore {
    fn stakeholders(&self) -> Result<Vec<Stakeholder>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.stakeholders.values().cloned().collect())
    }

    fn stakeholder(&self, id: &StakeholderId) -> Result<Option<Stakeholder>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.stakeholders.get(id).cloned())
    }

    fn latest_submission(&self, id: &StakeholderId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .reports
            .values()
            .filter(|report| &report.stakeholder_id == id)
            .map(|report| report.submitted_at)
            .max())
    }

    fn reports(&self, scope: ReportScope) -> Result<Vec<ReportRow>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut rows: Vec<ReportRow> = state
            .reports
            .values()
            .filter(|report| scope.includes(report.period))
            .filter_map(|report| {
                state
                    .stakeholders
                    .get(&report.stakeholder_id)
                    .map(|stakeholder| ReportRow {
                        stakeholder_name: stakeholder.name.clone(),
                        stakeholder_type: stakeholder.stakeholder_type,
                        report: report.clone(),
                    })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.report
                .period
                .cmp(&b.report.period)
                .then_with(|| a.stakeholder_name.cmp(&b.stakeholder_name))
        });
        Ok(rows)
    }

    fn report_exists(
        &self,
        id: &StakeholderId,
        period: ReportingPeriod,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.reports.contains_key(&(id.clone(), period)))
    }

    fn create_report(&self, report: Report) -> Result<Report, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let key = (report.stakeholder_id.clone(), report.period);
        if state.reports.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        state.reports.insert(key, report.clone());
        Ok(report)
    }

    fn create_notification(&self, notification: Notification) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.notifications.push(notification);
        Ok(())
    }

    fn notifications_for(&self, id: &StakeholderId) -> Result<Vec<Notification>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .notifications
            .iter()
            .filter(|notification| &notification.stakeholder_id == id)
            .cloned()
            .collect())
    }
}

/// Delegates to a [`MemoryStore`] but fails lookups or writes for chosen stakeholders.
#[derive(Default, Clone)]
pub(super) struct FlakyStore {
    pub(super) inner: MemoryStore,
    pub(super) failing_lookups: HashSet<StakeholderId>,
    pub(super) failing_writes: HashSet<StakeholderId>,
    /// Stakeholders whose history lookup answers `NotFound`.
    pub(super) vanished: HashSet<StakeholderId>,
    pub(super) reports_error: Option<StoreError>,
    pub(super) panic_on_listing: bool,
}

impl ReportStore for FlakyStore {
    fn stakeholders(&self) -> Result<Vec<Stakeholder>, StoreError> {
        if self.panic_on_listing {
            panic!("stakeholder listing crashed");
        }
        self.inner.stakeholders()
    }

    fn stakeholder(&self, id: &StakeholderId) -> Result<Option<Stakeholder>, StoreError> {
        self.inner.stakeholder(id)
    }

    fn latest_submission(&self, id: &StakeholderId) -> Result<Option<DateTime<Utc>>, StoreError> {
        if self.vanished.contains(id) {
            return Err(StoreError::NotFound);
        }
        self.inner.latest_submission(id)
    }

    fn reports(&self, scope: ReportScope) -> Result<Vec<ReportRow>, StoreError> {
        if let Some(error) = &self.reports_error {
            return Err(error.clone());
        }
        self.inner.reports(scope)
    }

    fn report_exists(
        &self,
        id: &StakeholderId,
        period: ReportingPeriod,
    ) -> Result<bool, StoreError> {
        if self.failing_lookups.contains(id) {
            return Err(StoreError::Unavailable("replica lagging".to_string()));
        }
        self.inner.report_exists(id, period)
    }

    fn create_report(&self, report: Report) -> Result<Report, StoreError> {
        self.inner.create_report(report)
    }

    fn create_notification(&self, notification: Notification) -> Result<(), StoreError> {
        if self.failing_writes.contains(&notification.stakeholder_id) {
            return Err(StoreError::Unavailable("write timeout".to_string()));
        }
        self.inner.create_notification(notification)
    }

    fn notifications_for(&self, id: &StakeholderId) -> Result<Vec<Notification>, StoreError> {
        self.inner.notifications_for(id)
    }
}

pub(super) struct UnavailableStore;

impl ReportStore for UnavailableStore {
    fn stakeholders(&self) -> Result<Vec<Stakeholder>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn stakeholder(&self, _id: &StakeholderId) -> Result<Option<Stakeholder>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn latest_submission(&self, _id: &StakeholderId) -> Result<Option<DateTime<Utc>>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn reports(&self, _scope: ReportScope) -> Result<Vec<ReportRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn report_exists(
        &self,
        _id: &StakeholderId,
        _period: ReportingPeriod,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn create_report(&self, _report: Report) -> Result<Report, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn create_notification(&self, _notification: Notification) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn notifications_for(&self, _id: &StakeholderId) -> Result<Vec<Notification>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct StaticIdentities;

impl IdentityResolver for StaticIdentities {
    fn resolve(&self, bearer: &str) -> Option<CallerIdentity> {
        (bearer == ADMIN_TOKEN).then(|| CallerIdentity::new("dinas-pariwisata"))
    }
}

pub(super) fn admin() -> CallerIdentity {
    CallerIdentity::new("dinas-pariwisata")
}

pub(super) fn build_service() -> (ReportingService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_stakeholders(region()));
    let service = ReportingService::new(store.clone(), CompliancePolicy::default());
    (service, store)
}

pub(super) fn api_for<S>(store: Arc<S>) -> ReportingApi<S>
where
    S: ReportStore + 'static,
{
    ReportingApi {
        service: Arc::new(ReportingService::new(
            store.clone(),
            CompliancePolicy::default(),
        )),
        sweep: Arc::new(ComplianceSweep::new(store, REMINDER)),
        identities: Arc::new(StaticIdentities),
    }
}

pub(super) fn router_for<S>(store: Arc<S>) -> axum::Router
where
    S: ReportStore + 'static,
{
    reporting_router(api_for(store))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
