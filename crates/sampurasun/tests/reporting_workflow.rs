use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use sampurasun::workflows::reporting::export::export_reader;
use sampurasun::workflows::reporting::{
    CallerIdentity, ComplianceStatus, ComplianceSweep, CompliancePolicy, Notification,
    PeriodFilter, Report, ReportRow, ReportScope, ReportStore, ReportSubmission,
    ReportingError, ReportingPeriod, ReportingService, Stakeholder, StakeholderId,
    StakeholderType, StoreError, SubmittedFigures, SweepOutcome, EXPORT_HEADER,
};

#[derive(Default)]
struct Tables {
    stakeholders: BTreeMap<StakeholderId, Stakeholder>,
    reports: BTreeMap<(StakeholderId, ReportingPeriod), Report>,
    notifications: Vec<Notification>,
}

/// Mutex-backed store whose stakeholder listing can be held open once, to
/// keep a sweep parked mid-run.
#[derive(Default)]
struct RegionStore {
    tables: Mutex<Tables>,
    hold_listing: AtomicBool,
    entered: Option<Arc<Barrier>>,
    release: Option<Arc<Barrier>>,
}

impl RegionStore {
    fn with(stakeholders: &[(&str, &str, StakeholderType)]) -> Self {
        let store = Self::default();
        {
            let mut tables = store.tables.lock().expect("tables mutex poisoned");
            for (id, name, stakeholder_type) in stakeholders {
                let id = StakeholderId(id.to_string());
                tables.stakeholders.insert(
                    id.clone(),
                    Stakeholder {
                        id,
                        name: name.to_string(),
                        stakeholder_type: *stakeholder_type,
                    },
                );
            }
        }
        store
    }

    fn holding_listing(mut self, entered: Arc<Barrier>, release: Arc<Barrier>) -> Self {
        self.hold_listing = AtomicBool::new(true);
        self.entered = Some(entered);
        self.release = Some(release);
        self
    }

    fn notification_count(&self) -> usize {
        self.tables
            .lock()
            .expect("tables mutex poisoned")
            .notifications
            .len()
    }
}

impl ReportStore for RegionStore {
    fn stakeholders(&self) -> Result<Vec<Stakeholder>, StoreError> {
        if self.hold_listing.swap(false, Ordering::AcqRel) {
            if let (Some(entered), Some(release)) = (&self.entered, &self.release) {
                entered.wait();
                release.wait();
            }
        }
        let tables = self.tables.lock().expect("tables mutex poisoned");
        Ok(tables.stakeholders.values().cloned().collect())
    }

    fn stakeholder(&self, id: &StakeholderId) -> Result<Option<Stakeholder>, StoreError> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        Ok(tables.stakeholders.get(id).cloned())
    }

    fn latest_submission(&self, id: &StakeholderId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        Ok(tables
            .reports
            .values()
            .filter(|report| &report.stakeholder_id == id)
            .map(|report| report.submitted_at)
            .max())
    }

    fn reports(&self, scope: ReportScope) -> Result<Vec<ReportRow>, StoreError> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        let mut rows: Vec<ReportRow> = tables
            .reports
            .values()
            .filter(|report| scope.includes(report.period))
            .filter_map(|report| {
                let stakeholder = tables.stakeholders.get(&report.stakeholder_id)?;
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
        let tables = self.tables.lock().expect("tables mutex poisoned");
        Ok(tables.reports.contains_key(&(id.clone(), period)))
    }

    fn create_report(&self, report: Report) -> Result<Report, StoreError> {
        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        let key = (report.stakeholder_id.clone(), report.period);
        if tables.reports.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        tables.reports.insert(key, report.clone());
        Ok(report)
    }

    fn create_notification(&self, notification: Notification) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        tables.notifications.push(notification);
        Ok(())
    }

    fn notifications_for(&self, id: &StakeholderId) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        Ok(tables
            .notifications
            .iter()
            .filter(|notification| &notification.stakeholder_id == id)
            .cloned()
            .collect())
    }
}

const REGION: [(&str, &str, StakeholderType); 4] = [
    ("hotel-papandayan", "The Papandayan", StakeholderType::Hotel),
    ("resto-kampung-daun", "Kampung Daun, Sersan Bajuri", StakeholderType::Restaurant),
    ("agency-lembang", "Lembang \"Explore\" Tour", StakeholderType::Agency),
    ("saung-udjo", "Saung Angklung Udjo", StakeholderType::Attraction),
];

fn instant(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0)
        .single()
        .expect("valid instant")
}

fn submission(id: &str, nusantara: i64, mancanegara: i64, occupancy: f64) -> ReportSubmission {
    ReportSubmission {
        stakeholder_id: StakeholderId(id.to_string()),
        period: None,
        figures: SubmittedFigures {
            nusantara,
            mancanegara,
            average_stay_days: 1.5,
            occupancy_rate: occupancy,
            average_spending: 425_000.0,
            dominant_origin: Some("Jakarta".to_string()),
        },
    }
}

#[test]
fn monthly_cycle_moves_stakeholders_through_compliance_states() {
    let store = Arc::new(RegionStore::with(&REGION));
    let service = ReportingService::new(Arc::clone(&store), CompliancePolicy::default());
    let caller = CallerIdentity::new("dinas-pariwisata");

    service
        .submit(submission("hotel-papandayan", 900, 120, 74.0), instant(2025, 3, 5))
        .expect("march report");
    service
        .submit(submission("resto-kampung-daun", 400, 15, 0.0), instant(2025, 1, 20))
        .expect("january report");

    let summary = service
        .dashboard_summary(&caller, instant(2025, 3, 20))
        .expect("dashboard");
    let status_of = |id: &str| {
        summary
            .stakeholders
            .iter()
            .find(|view| view.id.0 == id)
            .map(|view| view.status)
            .expect("stakeholder listed")
    };
    assert_eq!(status_of("hotel-papandayan"), ComplianceStatus::Compliant);
    assert_eq!(status_of("resto-kampung-daun"), ComplianceStatus::Overdue);
    assert_eq!(status_of("saung-udjo"), ComplianceStatus::Suspended);
    assert_eq!(summary.total_visitors, 1_435);
    assert_eq!(summary.average_occupancy, 37.0);

    let later = service
        .dashboard_summary(&caller, instant(2025, 4, 20))
        .expect("dashboard");
    let papandayan = later
        .stakeholders
        .iter()
        .find(|view| view.id.0 == "hotel-papandayan")
        .expect("listed");
    assert_eq!(papandayan.status, ComplianceStatus::Overdue);
    assert_eq!(papandayan.status_label, "Belum Lapor");
}

#[test]
fn export_round_trips_through_a_csv_reader() {
    let store = Arc::new(RegionStore::with(&REGION));
    let service = ReportingService::new(Arc::clone(&store), CompliancePolicy::default());
    let now = instant(2025, 8, 12);

    for (id, nusantara) in [("resto-kampung-daun", 310), ("agency-lembang", 75)] {
        service
            .submit(submission(id, nusantara, 4, 0.0), now)
            .expect("report accepted");
    }

    let artifact = service
        .export(&CallerIdentity::system(), PeriodFilter::Monthly, now)
        .expect("export renders");
    assert_eq!(artifact.rows, 2);

    let mut reader = export_reader(artifact.body.as_bytes());
    let headers = reader.headers().expect("header row").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), EXPORT_HEADER.to_vec());

    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("records parse");
    assert_eq!(&records[0][0], "Kampung Daun, Sersan Bajuri");
    assert_eq!(&records[0][1], "Restoran");
    assert_eq!(&records[0][2], "310");
    assert_eq!(&records[1][0], "Lembang \"Explore\" Tour");
    assert_eq!(&records[1][1], "Biro Perjalanan");
}

#[test]
fn duplicate_period_is_rejected_even_for_backdated_submissions() {
    let store = Arc::new(RegionStore::with(&REGION));
    let service = ReportingService::new(Arc::clone(&store), CompliancePolicy::default());

    let mut backdated = submission("saung-udjo", 5_000, 700, 0.0);
    backdated.period = ReportingPeriod::new(2025, 7);
    service
        .submit(backdated.clone(), instant(2025, 8, 2))
        .expect("late july report accepted");

    match service.submit(backdated, instant(2025, 8, 3)) {
        Err(ReportingError::DuplicateReport { period, .. }) => {
            assert_eq!(period, ReportingPeriod::new(2025, 7).expect("valid"));
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
}

#[test]
fn overlapping_sweep_is_skipped_while_first_run_is_parked() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let store = Arc::new(
        RegionStore::with(&REGION).holding_listing(Arc::clone(&entered), Arc::clone(&release)),
    );
    let sweep = Arc::new(ComplianceSweep::new(Arc::clone(&store), "Mohon kirim laporan."));
    let now = instant(2025, 8, 1);

    let background = {
        let sweep = Arc::clone(&sweep);
        std::thread::spawn(move || sweep.run_once(now))
    };

    entered.wait();
    assert_eq!(sweep.run_once(now + Duration::minutes(1)), SweepOutcome::Skipped);
    release.wait();

    match background.join().expect("sweep thread") {
        SweepOutcome::Completed(summary) => {
            assert_eq!(summary.scanned, 4);
            assert_eq!(summary.notified.len(), 4);
        }
        other => panic!("expected completed sweep, got {other:?}"),
    }
    assert_eq!(store.notification_count(), 4);

    match sweep.run_once(now + Duration::days(1)) {
        SweepOutcome::Completed(summary) => assert_eq!(summary.notified.len(), 4),
        other => panic!("expected completed sweep, got {other:?}"),
    }
    assert_eq!(store.notification_count(), 8);
}
