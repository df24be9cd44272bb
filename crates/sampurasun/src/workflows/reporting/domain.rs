use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Earliest reporting year accepted by intake.
pub const REPORTING_EPOCH_YEAR: i32 = 2000;

/// Identifier wrapper for registered stakeholders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StakeholderId(pub String);

impl fmt::Display for StakeholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

/// Business category of a tourism stakeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeholderType {
    Hotel,
    Agency,
    Restaurant,
    Attraction,
    Other,
}

impl StakeholderType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hotel => "Hotel",
            Self::Agency => "Biro Perjalanan",
            Self::Restaurant => "Restoran",
            Self::Attraction => "Objek Wisata",
            Self::Other => "Lainnya",
        }
    }
}

/// Registered stakeholder. Created and edited by an administrative process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    pub id: StakeholderId,
    pub name: String,
    pub stakeholder_type: StakeholderType,
}

/// Calendar month a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportingPeriod {
    // field order drives the derived ordering: year first, then month
    pub year: i32,
    pub month: u32,
}

impl ReportingPeriod {
    /// Builds a period, returning `None` when the month is outside 1..=12 or
    /// the year predates [`REPORTING_EPOCH_YEAR`].
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || year < REPORTING_EPOCH_YEAR {
            return None;
        }
        Some(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current(now: DateTime<Utc>) -> Self {
        Self::containing(now.date_naive())
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Statistical figures a stakeholder submits for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFigures {
    /// Domestic visitors.
    pub nusantara: u64,
    /// Foreign visitors.
    pub mancanegara: u64,
    pub average_stay_days: f64,
    /// Percent, 0 to 100.
    pub occupancy_rate: f64,
    /// Rupiah per visitor.
    pub average_spending: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_origin: Option<String>,
}

impl ReportFigures {
    pub fn total_visitors(&self) -> u64 {
        self.nusantara.saturating_add(self.mancanegara)
    }
}

/// Stored report. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub stakeholder_id: StakeholderId,
    pub period: ReportingPeriod,
    #[serde(flatten)]
    pub figures: ReportFigures,
    pub submitted_at: DateTime<Utc>,
}

/// Report joined with the stakeholder columns the export and dashboard need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub stakeholder_name: String,
    pub stakeholder_type: StakeholderType,
    pub report: Report,
}

/// Figures as submitted. Counts stay signed so a negative value reaches
/// the guard and is rejected with its field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedFigures {
    pub nusantara: i64,
    pub mancanegara: i64,
    pub average_stay_days: f64,
    pub occupancy_rate: f64,
    pub average_spending: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_origin: Option<String>,
}

/// Inbound submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSubmission {
    pub stakeholder_id: StakeholderId,
    /// Defaults to the calendar month of the submission instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<ReportingPeriod>,
    #[serde(flatten)]
    pub figures: SubmittedFigures,
}

/// Reminder appended by the compliance sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub stakeholder_id: StakeholderId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Export window requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodFilter {
    Monthly,
    Yearly,
    All,
}

impl PeriodFilter {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::All => "all",
        }
    }

    /// Resolves the filter against the generation date.
    pub fn scope(self, today: NaiveDate) -> ReportScope {
        match self {
            Self::Monthly => ReportScope::Month(ReportingPeriod::containing(today)),
            Self::Yearly => ReportScope::Year(today.year()),
            Self::All => ReportScope::All,
        }
    }

    pub fn export_filename(self) -> String {
        format!("laporan_{}.csv", self.as_str())
    }
}

impl FromStr for PeriodFilter {
    type Err = UnknownPeriodFilter;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "all" => Ok(Self::All),
            other => Err(UnknownPeriodFilter(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown export period '{0}' (expected monthly, yearly or all)")]
pub struct UnknownPeriodFilter(pub String);

/// Concrete report selection handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    Month(ReportingPeriod),
    Year(i32),
    All,
}

impl ReportScope {
    pub fn includes(&self, period: ReportingPeriod) -> bool {
        match self {
            Self::Month(month) => *month == period,
            Self::Year(year) => period.year == *year,
            Self::All => true,
        }
    }
}
