use axum::{
    extract::rejection::{BytesRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::OnceLock;
use utoipa::ToSchema;

use crate::scoring::ScoringError;

/// A single entry of a validation error response.
///
/// Serialized as `{"type": ..., "loc": [...], "msg": ..., "input": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldError {
    /// Machine-readable error kind (e.g. "missing", "less_than_equal").
    #[serde(rename = "type")]
    pub kind: String,
    /// Location of the offending value, starting with "body".
    pub loc: Vec<String>,
    /// Human-readable message.
    pub msg: String,
    /// The rejected input, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub input: Option<Value>,
}

impl FieldError {
    /// Builds an error located at `body.<field>`.
    pub fn for_field(
        field: &str,
        kind: impl Into<String>,
        msg: impl Into<String>,
        input: Option<Value>,
    ) -> Self {
        Self {
            kind: kind.into(),
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            input,
        }
    }

    /// Builds an error located at the request body itself.
    pub fn for_body(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            loc: vec!["body".to_string()],
            msg: msg.into(),
            input: None,
        }
    }
}

/// Body returned with 422 responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrorBody {
    pub detail: Vec<FieldError>,
}

/// Body returned with 404, 405, 413 and 500 responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Request failed schema validation; never reaches the scoring code.
    Validation(Vec<FieldError>),
    /// Scoring failed for this request.
    Computation(String),
    /// No route matched.
    NotFound(String),
    /// The route exists but not for this method.
    MethodNotAllowed(String),
    /// Request body exceeded the configured limit.
    PayloadTooLarge(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => {
                write!(f, "Validation error: {} invalid field(s)", errors.len())
            }
            AppError::Computation(msg) => write!(f, "Computation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::MethodNotAllowed(msg) => write!(f, "Method not allowed: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each variant to its status code and JSON body.
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(detail) => {
                tracing::warn!(errors = ?detail, "Request validation failed");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ValidationErrorBody { detail }),
                )
                    .into_response()
            }
            AppError::Computation(msg) => {
                tracing::error!("Computation error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": msg })),
                )
                    .into_response()
            }
            AppError::NotFound(msg) => {
                tracing::debug!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" }))).into_response()
            }
            AppError::MethodNotAllowed(msg) => {
                tracing::debug!("Method not allowed: {}", msg);
                (
                    StatusCode::METHOD_NOT_ALLOWED,
                    Json(json!({ "detail": "Method Not Allowed" })),
                )
                    .into_response()
            }
            AppError::PayloadTooLarge(msg) => {
                tracing::warn!("Rejected oversized body: {}", msg);
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({ "detail": "Request body too large" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::Computation(err.to_string())
    }
}

impl From<Vec<FieldError>> for AppError {
    fn from(errors: Vec<FieldError>) -> Self {
        AppError::Validation(errors)
    }
}

impl From<BytesRejection> for AppError {
    /// Body buffering failures: over the size limit is a 413, anything else a 422.
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::Validation(vec![FieldError::for_body(
                "body_error",
                rejection.body_text(),
            )])
        }
    }
}

impl From<JsonRejection> for AppError {
    /// Converts axum's JSON extraction failures into the validation tier.
    fn from(rejection: JsonRejection) -> Self {
        let error = match rejection {
            JsonRejection::BytesRejection(e) => return AppError::from(e),
            JsonRejection::JsonDataError(e) => describe_data_error(&e.body_text()),
            JsonRejection::JsonSyntaxError(e) => FieldError::for_body("json_invalid", e.body_text()),
            JsonRejection::MissingJsonContentType(e) => {
                FieldError::for_body("content_type", e.body_text())
            }
            other => FieldError::for_body("body_error", other.body_text()),
        };
        AppError::Validation(vec![error])
    }
}

fn missing_field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"missing field `([^`]+)`").expect("valid regex"))
}

fn field_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"target type: ([A-Za-z_][A-Za-z0-9_.\[\]]*): (.+)$").expect("valid regex")
    })
}

/// Classifies a serde data error reported by the JSON extractor.
///
/// Missing fields and type mismatches are located on the offending field;
/// anything else is reported against the whole body.
pub(crate) fn describe_data_error(text: &str) -> FieldError {
    if let Some(caps) = missing_field_pattern().captures(text) {
        return FieldError::for_field(&caps[1], "missing", "Field required", None);
    }

    if let Some(caps) = field_path_pattern().captures(text) {
        let mut loc = vec!["body".to_string()];
        loc.extend(caps[1].split('.').map(str::to_string));
        return FieldError {
            kind: "type_error".to_string(),
            loc,
            msg: caps[2].to_string(),
            input: None,
        };
    }

    FieldError::for_body("value_error", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_is_located() {
        let err = describe_data_error(
            "Failed to deserialize the JSON body into the target type: missing field `hba1c` at line 1 column 40",
        );
        assert_eq!(err.kind, "missing");
        assert_eq!(err.loc, vec!["body", "hba1c"]);
        assert_eq!(err.msg, "Field required");
    }

    #[test]
    fn test_type_mismatch_is_located() {
        let err = describe_data_error(
            "Failed to deserialize the JSON body into the target type: age: invalid type: string \"old\", expected i64 at line 1 column 13",
        );
        assert_eq!(err.kind, "type_error");
        assert_eq!(err.loc, vec!["body", "age"]);
        assert!(err.msg.starts_with("invalid type"));
    }

    #[test]
    fn test_unclassified_error_points_at_body() {
        let err = describe_data_error("something odd");
        assert_eq!(err.loc, vec!["body"]);
        assert_eq!(err.kind, "value_error");
    }

    #[test]
    fn test_status_mapping() {
        let resp = AppError::Validation(vec![]).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = AppError::Computation("boom".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = AppError::NotFound("/nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::PayloadTooLarge("limit".into()).into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = AppError::MethodNotAllowed("GET /".into()).into_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_field_error_serialization_omits_missing_input() {
        let value = serde_json::to_value(FieldError::for_body("json_invalid", "bad")).unwrap();
        assert_eq!(value["type"], "json_invalid");
        assert!(value.get("input").is_none());
    }
}
