//! OpenAPI document and Swagger UI.
//!
//! Prediction paths are declared relative to their router and rebased onto
//! the configured prefix when the document is built.

use utoipa::openapi::OpenApi as OpenApiDoc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::errors::{ErrorDetail, FieldError, ValidationErrorBody};
use crate::handlers;
use crate::models::{
    ClinicalData, DrStage, ExplanationData, FeatureContribution, HealthStatus, PredictionHealth,
    PredictionResponse, RiskCategory, RiskScore, ServiceStatus,
};

pub const SWAGGER_UI_PATH: &str = "/docs";
pub const OPENAPI_JSON_PATH: &str = "/openapi.json";

#[derive(OpenApi)]
#[openapi(
    paths(handlers::root, handlers::health),
    components(schemas(ServiceStatus, HealthStatus)),
    tags((name = "Service", description = "Liveness and service metadata"))
)]
struct ServiceApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::demo_analyze, handlers::prediction_health),
    components(schemas(
        ClinicalData,
        PredictionResponse,
        RiskScore,
        RiskCategory,
        DrStage,
        FeatureContribution,
        ExplanationData,
        PredictionHealth,
        FieldError,
        ValidationErrorBody,
        ErrorDetail
    )),
    tags((name = "Prediction", description = "Diabetic retinopathy risk estimation"))
)]
struct PredictionApi;

/// Builds the OpenAPI document for the configured prefix and app metadata.
pub fn openapi(config: &Config) -> OpenApiDoc {
    let mut doc = ServiceApi::openapi();

    let mut prediction = PredictionApi::openapi();
    let relative = std::mem::take(&mut prediction.paths.paths);
    prediction.paths.paths = relative
        .into_iter()
        .map(|(path, item)| (format!("{}{}", config.api_prefix, path), item))
        .collect();
    doc.merge(prediction);

    doc.info.title = config.app_name.clone();
    doc.info.description = Some(config.app_description.clone());
    doc.info.version = config.app_version.clone();
    doc
}

pub fn swagger_ui(config: &Config) -> SwaggerUi {
    SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, openapi(config))
}
