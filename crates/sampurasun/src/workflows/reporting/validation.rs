use chrono::{DateTime, Utc};

use super::domain::{ReportFigures, ReportSubmission, ReportingPeriod, REPORTING_EPOCH_YEAR};

const MAX_ORIGIN_LEN: usize = 64;

/// Rejected submission field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Submission accepted by the guard, with its period resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub period: ReportingPeriod,
    pub figures: ReportFigures,
}

/// Checks field ranges and resolves the reporting period.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard;

impl SubmissionGuard {
    pub fn validate(
        &self,
        submission: &ReportSubmission,
        now: DateTime<Utc>,
    ) -> Result<ValidatedSubmission, ValidationError> {
        if submission.stakeholder_id.0.trim().is_empty() {
            return Err(ValidationError::new("stakeholder_id", "must not be empty"));
        }

        let current = ReportingPeriod::current(now);
        let period = match submission.period {
            Some(requested) => {
                let period = ReportingPeriod::new(requested.year, requested.month).ok_or_else(|| {
                    ValidationError::new(
                        "period",
                        format!(
                            "month must be 1-12 and year at least {REPORTING_EPOCH_YEAR} (found {}-{})",
                            requested.year, requested.month
                        ),
                    )
                })?;
                if period > current {
                    return Err(ValidationError::new(
                        "period",
                        format!("{period} is after the current period {current}"),
                    ));
                }
                period
            }
            None => current,
        };

        let figures = &submission.figures;
        let nusantara = visitor_count("nusantara", figures.nusantara)?;
        let mancanegara = visitor_count("mancanegara", figures.mancanegara)?;
        non_negative("average_stay_days", figures.average_stay_days)?;
        non_negative("average_spending", figures.average_spending)?;
        non_negative("occupancy_rate", figures.occupancy_rate)?;
        if figures.occupancy_rate > 100.0 {
            return Err(ValidationError::new(
                "occupancy_rate",
                format!("must be at most 100 (found {})", figures.occupancy_rate),
            ));
        }

        let dominant_origin = match figures.dominant_origin.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(origin) if origin.chars().count() > MAX_ORIGIN_LEN => {
                return Err(ValidationError::new(
                    "dominant_origin",
                    format!("must be at most {MAX_ORIGIN_LEN} characters"),
                ));
            }
            Some(origin) => Some(origin.to_string()),
        };

        Ok(ValidatedSubmission {
            period,
            figures: ReportFigures {
                nusantara,
                mancanegara,
                average_stay_days: figures.average_stay_days,
                occupancy_rate: figures.occupancy_rate,
                average_spending: figures.average_spending,
                dominant_origin,
            },
        })
    }
}

fn visitor_count(field: &'static str, value: i64) -> Result<u64, ValidationError> {
    u64::try_from(value).map_err(|_| {
        ValidationError::new(field, format!("must not be negative (found {value})"))
    })
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(ValidationError::new(
            field,
            format!("must not be negative (found {value})"),
        ));
    }
    Ok(())
}
