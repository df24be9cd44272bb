use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use super::domain::{PeriodFilter, ReportSubmission, StakeholderId};
use super::export::CSV_CONTENT_TYPE;
use super::identity::{bearer_token, CallerIdentity, IdentityResolver};
use super::service::{ReportingError, ReportingService};
use super::store::ReportStore;
use super::sweep::{ComplianceSweep, SweepOutcome};

const RETRY_AFTER_SECS: &str = "30";

/// Shared handler state.
pub struct ReportingApi<S> {
    pub service: Arc<ReportingService<S>>,
    pub sweep: Arc<ComplianceSweep<S>>,
    pub identities: Arc<dyn IdentityResolver>,
}

impl<S> Clone for ReportingApi<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sweep: Arc::clone(&self.sweep),
            identities: Arc::clone(&self.identities),
        }
    }
}

/// Router builder exposing the dashboard, export, intake and sweep endpoints.
pub fn reporting_router<S>(api: ReportingApi<S>) -> Router
where
    S: ReportStore + 'static,
{
    Router::new()
        .route("/api/admin/dashboard", get(dashboard_handler::<S>))
        .route("/api/admin/export/:period", get(export_handler::<S>))
        .route("/api/admin/trend/:period", get(trend_handler::<S>))
        .route("/api/admin/sweep", post(sweep_handler::<S>))
        .route("/api/reports", post(submit_handler::<S>))
        .route(
            "/api/stakeholders/:stakeholder_id/status",
            get(status_handler::<S>),
        )
        .route(
            "/api/stakeholders/:stakeholder_id/notifications",
            get(notifications_handler::<S>),
        )
        .with_state(api)
}

fn authenticate(
    headers: &HeaderMap,
    identities: &dyn IdentityResolver,
) -> Result<CallerIdentity, Response> {
    bearer_token(headers)
        .and_then(|token| identities.resolve(token))
        .ok_or_else(|| {
            let payload = json!({ "error": "missing or unrecognised bearer token" });
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                axum::Json(payload),
            )
                .into_response()
        })
}

pub(crate) fn error_response(err: ReportingError) -> Response {
    match err {
        ReportingError::Validation(error) => {
            let payload = json!({
                "error": error.to_string(),
                "field": error.field,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        ReportingError::DuplicateReport {
            stakeholder_id,
            period,
        } => {
            let payload = json!({
                "error": "report already submitted for this period",
                "stakeholder_id": stakeholder_id,
                "period": period.to_string(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        ReportingError::NotFound(stakeholder_id) => {
            let payload = json!({
                "error": "unknown stakeholder",
                "stakeholder_id": stakeholder_id,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        ReportingError::StoreUnavailable(reason) => {
            warn!(%reason, "report store unavailable");
            let payload = json!({
                "error": "report store temporarily unavailable",
                "retryable": true,
            });
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                axum::Json(payload),
            )
                .into_response()
        }
        other @ (ReportingError::Store(_) | ReportingError::Export(_)) => {
            error!(error = %other, "reporting request failed");
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn parse_period(raw: &str) -> Result<PeriodFilter, Response> {
    raw.parse::<PeriodFilter>().map_err(|err| {
        let payload = json!({ "error": err.to_string(), "field": "period" });
        (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
    })
}

pub(crate) async fn dashboard_handler<S>(
    State(api): State<ReportingApi<S>>,
    headers: HeaderMap,
) -> Response
where
    S: ReportStore + 'static,
{
    let caller = match authenticate(&headers, api.identities.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match api.service.dashboard_summary(&caller, Utc::now()) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn export_handler<S>(
    State(api): State<ReportingApi<S>>,
    Path(period): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: ReportStore + 'static,
{
    let caller = match authenticate(&headers, api.identities.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let filter = match parse_period(&period) {
        Ok(filter) => filter,
        Err(response) => return response,
    };

    match api.service.export(&caller, filter, Utc::now()) {
        Ok(artifact) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.filename),
                ),
            ],
            artifact.body,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn trend_handler<S>(
    State(api): State<ReportingApi<S>>,
    Path(period): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: ReportStore + 'static,
{
    if let Err(response) = authenticate(&headers, api.identities.as_ref()) {
        return response;
    }
    let filter = match parse_period(&period) {
        Ok(filter) => filter,
        Err(response) => return response,
    };

    let scope = filter.scope(Utc::now().date_naive());
    match api.service.monthly_trend(scope) {
        Ok(trend) => (StatusCode::OK, axum::Json(trend)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn sweep_handler<S>(
    State(api): State<ReportingApi<S>>,
    headers: HeaderMap,
) -> Response
where
    S: ReportStore + 'static,
{
    let caller = match authenticate(&headers, api.identities.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    tracing::info!(caller = %caller.subject, "manual compliance sweep requested");

    let sweep = Arc::clone(&api.sweep);
    let outcome = match tokio::task::spawn_blocking(move || sweep.run_once(Utc::now())).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "compliance sweep task failed");
            let payload = json!({ "error": "compliance sweep task failed" });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response();
        }
    };

    let status = match &outcome {
        SweepOutcome::Completed(_) => StatusCode::OK,
        SweepOutcome::Skipped => StatusCode::CONFLICT,
        SweepOutcome::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, axum::Json(outcome)).into_response()
}

/// Body rejections keep the `{error, field}` shape of validation errors.
fn rejection_response(rejection: JsonRejection) -> Response {
    let message = rejection.body_text();
    let field = rejected_field(&message).map(str::to_owned);
    let payload = json!({ "error": message, "field": field });
    (rejection.status(), axum::Json(payload)).into_response()
}

/// Field named by a serde data error such as "missing field `nusantara`".
fn rejected_field(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once("field `")?;
    rest.split_once('`').map(|(field, _)| field)
}

pub(crate) async fn submit_handler<S>(
    State(api): State<ReportingApi<S>>,
    payload: Result<axum::Json<ReportSubmission>, JsonRejection>,
) -> Response
where
    S: ReportStore + 'static,
{
    let submission = match payload {
        Ok(axum::Json(submission)) => submission,
        Err(rejection) => return rejection_response(rejection),
    };
    match api.service.submit(submission, Utc::now()) {
        Ok(report) => (StatusCode::CREATED, axum::Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S>(
    State(api): State<ReportingApi<S>>,
    Path(stakeholder_id): Path<String>,
) -> Response
where
    S: ReportStore + 'static,
{
    let id = StakeholderId(stakeholder_id);
    match api.service.stakeholder_status(&id, Utc::now()) {
        Ok(card) => (StatusCode::OK, axum::Json(card)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn notifications_handler<S>(
    State(api): State<ReportingApi<S>>,
    Path(stakeholder_id): Path<String>,
) -> Response
where
    S: ReportStore + 'static,
{
    let id = StakeholderId(stakeholder_id);
    match api.service.notifications(&id) {
        Ok(notifications) => (StatusCode::OK, axum::Json(notifications)).into_response(),
        Err(err) => error_response(err),
    }
}
