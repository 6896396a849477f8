use crate::config::Config;
use crate::errors::{AppError, ErrorDetail, ValidationErrorBody};
use crate::extract::ValidatedJson;
use crate::models::*;
use crate::services::PredictionService;
use axum::{
    extract::State,
    http::{Method, Uri},
    Json,
};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Scoring service; stateless apart from its clock/id provider.
    pub service: PredictionService,
}

impl AppState {
    /// State using the system clock and random prediction ids.
    pub fn new(config: Config) -> Self {
        let service = PredictionService::with_system_provider(config.model_version.clone());
        Self { config, service }
    }

    pub fn with_service(config: Config, service: PredictionService) -> Self {
        Self { config, service }
    }
}

/// GET /
///
/// Reports the service name and that it is running.
#[utoipa::path(
    get,
    path = "/",
    tag = "Service",
    responses((status = 200, description = "Service is running", body = ServiceStatus))
)]
pub async fn root(State(state): State<Arc<AppState>>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        message: state.config.app_name.clone(),
        status: "running".to_string(),
    })
}

/// GET /health
///
/// Liveness probe; no dependencies are checked.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Service",
    responses((status = 200, description = "Service is alive", body = HealthStatus))
)]
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
    })
}

/// GET {prefix}/health
///
/// Readiness of the prediction routes. `model_loaded` is constant.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Prediction",
    responses((status = 200, description = "Prediction routes ready", body = PredictionHealth))
)]
pub async fn prediction_health() -> Json<PredictionHealth> {
    Json(PredictionHealth {
        status: "healthy".to_string(),
        model_loaded: true,
    })
}

/// POST {prefix}/demo-analyze
///
/// Scores a patient's clinical measurements and returns the full risk report.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `data` - Validated clinical measurements.
///
/// # Returns
///
/// * `Result<Json<PredictionResponse>, AppError>` - The report, or a computation error (500).
#[utoipa::path(
    post,
    path = "/demo-analyze",
    tag = "Prediction",
    request_body = ClinicalData,
    responses(
        (status = 200, description = "Risk report", body = PredictionResponse),
        (status = 422, description = "Request validation failed", body = ValidationErrorBody),
        (status = 413, description = "Request body too large", body = ErrorDetail),
        (status = 500, description = "Scoring failed", body = ErrorDetail)
    )
)]
pub async fn demo_analyze(
    State(state): State<Arc<AppState>>,
    ValidatedJson(data): ValidatedJson<ClinicalData>,
) -> Result<Json<PredictionResponse>, AppError> {
    tracing::info!(
        age = data.age,
        hba1c = data.hba1c,
        diabetes_duration = data.diabetes_duration,
        "POST /demo-analyze"
    );

    let response = state.service.estimate(&data).map_err(|e| {
        tracing::error!("✗ Scoring failed: {}", e);
        AppError::from(e)
    })?;

    tracing::info!(
        "✓ Prediction {} -> {} (follow-up in {} months, {:.3} ms)",
        response.prediction_id,
        response.dr_stage,
        response.follow_up_months,
        response.processing_time_ms
    );

    Ok(Json(response))
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Fallback for known routes called with an unsupported method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}
