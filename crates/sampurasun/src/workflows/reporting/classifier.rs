use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_WINDOW_DAYS: i64 = 30;
const DEFAULT_GRACE_DAYS: i64 = 30;

/// Reporting compliance derived from the latest submission. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Overdue,
    Suspended,
}

impl ComplianceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Compliant => "Sudah Lapor",
            Self::Overdue => "Belum Lapor",
            Self::Suspended => "Suspend",
        }
    }

    /// Traffic-light colour used by the dashboards.
    pub const fn colour(self) -> &'static str {
        match self {
            Self::Compliant => "green",
            Self::Overdue => "yellow",
            Self::Suspended => "red",
        }
    }
}

/// Day thresholds for the three-tier status rule.
///
/// * elapsed <= `window` : compliant
/// * elapsed <= `window + grace` : overdue
/// * otherwise, or no submission at all : suspended
///
/// A zero grace collapses the rule to compliant/suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompliancePolicy {
    window: Duration,
    grace: Duration,
}

impl CompliancePolicy {
    /// Negative durations are clamped to zero.
    pub fn new(window: Duration, grace: Duration) -> Self {
        Self {
            window: window.max(Duration::zero()),
            grace: grace.max(Duration::zero()),
        }
    }

    pub fn two_tier(window: Duration) -> Self {
        Self::new(window, Duration::zero())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn classify(
        &self,
        latest_submission: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ComplianceStatus {
        let Some(latest) = latest_submission else {
            return ComplianceStatus::Suspended;
        };

        // submissions stamped after `now` (clock skew) count as fresh
        let elapsed = (now - latest).max(Duration::zero());

        if elapsed <= self.window {
            ComplianceStatus::Compliant
        } else if self
            .window
            .checked_add(&self.grace)
            .map_or(true, |limit| elapsed <= limit)
        {
            ComplianceStatus::Overdue
        } else {
            ComplianceStatus::Suspended
        }
    }
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self::new(
            Duration::days(DEFAULT_WINDOW_DAYS),
            Duration::days(DEFAULT_GRACE_DAYS),
        )
    }
}
