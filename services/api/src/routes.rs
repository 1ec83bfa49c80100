use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use claim_scope::error::AppError;
use claim_scope::scope::{
    ScopeResult, SuggestedItem, ValidationResult, Zone, ZoneAssessment, ZoneId, ZoneMetrics,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateRequest {
    pub(crate) zone: Zone,
    pub(crate) items: Vec<SuggestedItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchAssessRequest {
    pub(crate) zones: Vec<Zone>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetricsResponse {
    pub(crate) zone_id: ZoneId,
    pub(crate) metrics: ZoneMetrics,
    pub(crate) evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScopeResponse {
    #[serde(flatten)]
    pub(crate) scope: ScopeResult,
    pub(crate) evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateResponse {
    pub(crate) zone_id: ZoneId,
    pub(crate) validation: ValidationResult,
    pub(crate) evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssessResponse {
    #[serde(flatten)]
    pub(crate) assessment: ZoneAssessment,
    pub(crate) evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchAssessResponse {
    pub(crate) assessments: Vec<ZoneAssessment>,
    pub(crate) evaluated_at: DateTime<Utc>,
}

pub(crate) fn scope_router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/zones/metrics", post(zone_metrics_endpoint))
        .route("/api/v1/zones/scope", post(scope_endpoint))
        .route("/api/v1/zones/validate", post(validate_endpoint))
        .route("/api/v1/zones/assess", post(assess_endpoint))
        .route("/api/v1/zones/assess/batch", post(batch_assess_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready", "catalogRules": state.engine.catalog().len() })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn zone_metrics_endpoint(
    Extension(state): Extension<AppState>,
    Json(zone): Json<Zone>,
) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        metrics: state.engine.metrics(&zone),
        zone_id: zone.id,
        evaluated_at: Utc::now(),
    })
}

pub(crate) async fn scope_endpoint(
    Extension(state): Extension<AppState>,
    Json(zone): Json<Zone>,
) -> Result<Json<ScopeResponse>, AppError> {
    let scope = state.engine.scope(&zone)?;
    Ok(Json(ScopeResponse {
        scope,
        evaluated_at: Utc::now(),
    }))
}

pub(crate) async fn validate_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> Json<ValidateResponse> {
    let ValidateRequest { zone, items } = payload;
    let validation = state.engine.validate(&items, &zone);

    Json(ValidateResponse {
        zone_id: zone.id,
        validation,
        evaluated_at: Utc::now(),
    })
}

pub(crate) async fn assess_endpoint(
    Extension(state): Extension<AppState>,
    Json(zone): Json<Zone>,
) -> Result<Json<AssessResponse>, AppError> {
    let assessment = state.engine.assess(&zone)?;
    Ok(Json(AssessResponse {
        assessment,
        evaluated_at: Utc::now(),
    }))
}

pub(crate) async fn batch_assess_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<BatchAssessRequest>,
) -> Result<Json<BatchAssessResponse>, AppError> {
    let assessments = state
        .engine
        .assess_all(&payload.zones)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(BatchAssessResponse {
        assessments,
        evaluated_at: Utc::now(),
    }))
}
