use chrono::{DateTime, Datelike, Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use sampurasun::config::{AppConfig, AuthConfig};
use sampurasun::workflows::reporting::{
    CallerIdentity, ComplianceSweep, IdentityResolver, Notification, Report, ReportFigures,
    ReportId, ReportRow, ReportScope, ReportStore, ReportingApi, ReportingPeriod,
    ReportingService, Stakeholder, StakeholderId, StakeholderType, StoreError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreState {
    stakeholders: BTreeMap<StakeholderId, Stakeholder>,
    reports: BTreeMap<(StakeholderId, ReportingPeriod), Report>,
    notifications: Vec<Notification>,
}

/// Process-local store. The `(stakeholder, period)` uniqueness check and the
/// insert happen under one lock.
#[derive(Default, Clone)]
pub(crate) struct InMemoryReportStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryReportStore {
    pub(crate) fn register(&self, stakeholder: Stakeholder) {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        guard.stakeholders.insert(stakeholder.id.clone(), stakeholder);
    }

    #[cfg(test)]
    pub(crate) fn report_count(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").reports.len()
    }

    pub(crate) fn notification_count(&self) -> usize {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .notifications
            .len()
    }
}

impl ReportStore for InMemoryReportStore {
    fn stakeholders(&self) -> Result<Vec<Stakeholder>, StoreError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.stakeholders.values().cloned().collect())
    }

    fn stakeholder(&self, id: &StakeholderId) -> Result<Option<Stakeholder>, StoreError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.stakeholders.get(id).cloned())
    }

    fn latest_submission(&self, id: &StakeholderId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .reports
            .values()
            .filter(|report| &report.stakeholder_id == id)
            .map(|report| report.submitted_at)
            .max())
    }

    fn reports(&self, scope: ReportScope) -> Result<Vec<ReportRow>, StoreError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        let mut rows: Vec<ReportRow> = guard
            .reports
            .values()
            .filter(|report| scope.includes(report.period))
            .filter_map(|report| {
                let stakeholder = guard.stakeholders.get(&report.stakeholder_id)?;
                Some(ReportRow {
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
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.reports.contains_key(&(id.clone(), period)))
    }

    fn create_report(&self, report: Report) -> Result<Report, StoreError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        if !guard.stakeholders.contains_key(&report.stakeholder_id) {
            return Err(StoreError::NotFound);
        }
        let key = (report.stakeholder_id.clone(), report.period);
        if guard.reports.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.reports.insert(key, report.clone());
        Ok(report)
    }

    fn create_notification(&self, notification: Notification) -> Result<(), StoreError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        if !guard.stakeholders.contains_key(&notification.stakeholder_id) {
            return Err(StoreError::NotFound);
        }
        guard.notifications.push(notification);
        Ok(())
    }

    fn notifications_for(&self, id: &StakeholderId) -> Result<Vec<Notification>, StoreError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .notifications
            .iter()
            .filter(|notification| &notification.stakeholder_id == id)
            .cloned()
            .collect())
    }
}

/// Resolves bearer tokens against the configured `APP_ADMIN_TOKENS` table.
#[derive(Debug, Clone, Default)]
pub(crate) struct StaticTokenResolver {
    subjects: HashMap<String, String>,
}

impl StaticTokenResolver {
    pub(crate) fn from_config(config: &AuthConfig) -> Self {
        Self {
            subjects: config.admin_tokens.iter().cloned().collect(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, bearer: &str) -> Option<CallerIdentity> {
        self.subjects.get(bearer).map(CallerIdentity::new)
    }
}

pub(crate) fn build_reporting_api(
    config: &AppConfig,
    store: Arc<InMemoryReportStore>,
    identities: Arc<dyn IdentityResolver>,
) -> ReportingApi<InMemoryReportStore> {
    ReportingApi {
        service: Arc::new(ReportingService::new(
            Arc::clone(&store),
            config.compliance.policy(),
        )),
        sweep: Arc::new(ComplianceSweep::new(store, config.sweep.message.clone())),
        identities,
    }
}

fn months_before(period: ReportingPeriod, months: u32) -> ReportingPeriod {
    let index = period.year * 12 + period.month as i32 - 1 - months as i32;
    ReportingPeriod::new(index.div_euclid(12), index.rem_euclid(12) as u32 + 1).unwrap_or(period)
}

fn demo_figures(
    nusantara: u64,
    mancanegara: u64,
    occupancy_rate: f64,
    average_spending: f64,
    origin: &str,
) -> ReportFigures {
    ReportFigures {
        nusantara,
        mancanegara,
        average_stay_days: 2.0,
        occupancy_rate,
        average_spending,
        dominant_origin: Some(origin.to_string()),
    }
}

/// Registers a sample Bandung region whose stakeholders land in every compliance state as of `now`.
pub(crate) fn seed_demo_region(
    store: &InMemoryReportStore,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let stakeholders = [
        ("hotel-savoy", "Hotel Savoy Homann", StakeholderType::Hotel),
        ("hotel-preanger", "Grand Hotel Preanger", StakeholderType::Hotel),
        ("agency-priangan", "Priangan Tour & Travel", StakeholderType::Agency),
        ("resto-sindang", "Rumah Makan Sindang Reret", StakeholderType::Restaurant),
        ("tangkuban-parahu", "Tangkuban Parahu", StakeholderType::Attraction),
        ("kawah-putih", "Kawah Putih Ciwidey", StakeholderType::Attraction),
    ];
    for (id, name, stakeholder_type) in stakeholders {
        store.register(Stakeholder {
            id: StakeholderId(id.to_string()),
            name: name.to_string(),
            stakeholder_type,
        });
    }

    let current = ReportingPeriod::current(now);
    let day_in_month = i64::from(now.day());
    let seeds = [
        ("hotel-savoy", 0, day_in_month / 2, demo_figures(1_450, 210, 81.5, 1_250_000.0, "Jakarta")),
        ("hotel-savoy", 1, 25, demo_figures(1_320, 185, 77.25, 1_180_000.0, "Malaysia")),
        ("hotel-savoy", 2, 56, demo_figures(1_210, 160, 72.0, 1_100_000.0, "Jakarta")),
        ("hotel-preanger", 1, 42, demo_figures(980, 240, 68.4, 1_420_000.0, "Singapura")),
        ("hotel-preanger", 2, 70, demo_figures(1_020, 230, 70.1, 1_390_000.0, "Singapura")),
        ("agency-priangan", 0, day_in_month / 2, demo_figures(640, 95, 0.0, 2_300_000.0, "Surabaya")),
        ("agency-priangan", 1, 28, demo_figures(590, 80, 0.0, 2_150_000.0, "Surabaya")),
        ("resto-sindang", 3, 88, demo_figures(2_800, 120, 0.0, 185_000.0, "Bekasi")),
        ("tangkuban-parahu", 1, 12, demo_figures(8_900, 1_150, 0.0, 95_000.0, "Jakarta")),
    ];

    let mut created = 0;
    for (id, months_back, days_ago, figures) in seeds {
        let period = months_before(current, months_back);
        let report = Report {
            id: ReportId(format!("seed-{id}-{period}")),
            stakeholder_id: StakeholderId(id.to_string()),
            period,
            figures,
            submitted_at: now - Duration::days(days_ago),
        };
        store.create_report(report)?;
        created += 1;
    }
    Ok(created)
}
