use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Number, Value};
use utoipa::ToSchema;

use crate::errors::FieldError;

/// Inclusive bounds accepted for `ClinicalData::age`.
pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 120;

// ============ Request Models ============

/// Clinical measurements for one diabetic patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClinicalData {
    /// Age in years (0-120).
    #[schema(minimum = 0, maximum = 120)]
    #[serde(deserialize_with = "lax_int")]
    pub age: i64,
    pub gender: String,
    /// Body-mass index.
    pub bmi: f64,
    /// Glycated haemoglobin, in percent.
    pub hba1c: f64,
    pub blood_glucose: f64,
    #[serde(deserialize_with = "lax_int")]
    pub blood_pressure_systolic: i64,
    #[serde(deserialize_with = "lax_int")]
    pub blood_pressure_diastolic: i64,
    /// Years since diagnosis.
    #[serde(deserialize_with = "lax_int")]
    pub diabetes_duration: i64,
    pub creatinine: f64,
    pub cholesterol_total: f64,
    pub cholesterol_ldl: f64,
    pub cholesterol_hdl: f64,
    pub triglycerides: f64,
    #[serde(default)]
    pub has_hypertension: bool,
    /// Free-form; "current" is the only value the scoring reacts to.
    #[serde(default = "default_smoking_status")]
    #[schema(default = "never")]
    pub smoking_status: String,
    #[serde(default)]
    pub family_history: bool,
}

fn default_smoking_status() -> String {
    "never".to_string()
}

/// Integer fields also accept whole-number floats such as `10.0`.
fn lax_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = Number::deserialize(deserializer)?;
    whole_number(&number)
        .ok_or_else(|| de::Error::custom(format!("invalid value: {}, expected an integer", number)))
}

fn whole_number(number: &Number) -> Option<i64> {
    if let Some(n) = number.as_i64() {
        return Some(n);
    }
    number
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
}

/// Field-level checks that run after deserialization and before any handler logic.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;

    /// Every field-level problem in a body that failed to deserialize.
    ///
    /// An empty list means the caller falls back to the deserializer's own message.
    fn diagnose(_raw: &Value) -> Vec<FieldError>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Int,
    Float,
    Str,
    Bool,
}

/// `ClinicalData` fields in declaration order: name, kind, required.
const CLINICAL_FIELDS: [(&str, FieldKind, bool); 16] = [
    ("age", FieldKind::Int, true),
    ("gender", FieldKind::Str, true),
    ("bmi", FieldKind::Float, true),
    ("hba1c", FieldKind::Float, true),
    ("blood_glucose", FieldKind::Float, true),
    ("blood_pressure_systolic", FieldKind::Int, true),
    ("blood_pressure_diastolic", FieldKind::Int, true),
    ("diabetes_duration", FieldKind::Int, true),
    ("creatinine", FieldKind::Float, true),
    ("cholesterol_total", FieldKind::Float, true),
    ("cholesterol_ldl", FieldKind::Float, true),
    ("cholesterol_hdl", FieldKind::Float, true),
    ("triglycerides", FieldKind::Float, true),
    ("has_hypertension", FieldKind::Bool, false),
    ("smoking_status", FieldKind::Str, false),
    ("family_history", FieldKind::Bool, false),
];

fn check_kind(field: &str, kind: FieldKind, value: &Value) -> Option<FieldError> {
    let (error_kind, msg) = match (kind, value) {
        (FieldKind::Int, Value::Number(n)) if whole_number(n).is_some() => return None,
        (FieldKind::Int, Value::Number(n)) if n.as_f64().map_or(false, |f| f.fract() != 0.0) => (
            "int_from_float",
            "Input should be a valid integer, got a number with a fractional part",
        ),
        (FieldKind::Int, _) => ("int_type", "Input should be a valid integer"),
        (FieldKind::Float, Value::Number(_)) => return None,
        (FieldKind::Float, _) => ("float_type", "Input should be a valid number"),
        (FieldKind::Str, Value::String(_)) => return None,
        (FieldKind::Str, _) => ("string_type", "Input should be a valid string"),
        (FieldKind::Bool, Value::Bool(_)) => return None,
        (FieldKind::Bool, _) => ("bool_type", "Input should be a valid boolean"),
    };
    Some(FieldError::for_field(field, error_kind, msg, Some(value.clone())))
}

fn check_age(age: i64) -> Option<FieldError> {
    if age < MIN_AGE {
        Some(FieldError::for_field(
            "age",
            "greater_than_equal",
            format!("Input should be greater than or equal to {}", MIN_AGE),
            Some(json!(age)),
        ))
    } else if age > MAX_AGE {
        Some(FieldError::for_field(
            "age",
            "less_than_equal",
            format!("Input should be less than or equal to {}", MAX_AGE),
            Some(json!(age)),
        ))
    } else {
        None
    }
}

impl Validate for ClinicalData {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        match check_age(self.age) {
            Some(error) => Err(vec![error]),
            None => Ok(()),
        }
    }

    fn diagnose(raw: &Value) -> Vec<FieldError> {
        let Some(body) = raw.as_object() else {
            return vec![FieldError {
                kind: "model_attributes_type".to_string(),
                loc: vec!["body".to_string()],
                msg: "Input should be a valid dictionary or object to extract fields from"
                    .to_string(),
                input: Some(raw.clone()),
            }];
        };

        let mut errors = Vec::new();
        for (field, kind, required) in CLINICAL_FIELDS {
            match body.get(field) {
                None if required => errors.push(FieldError::for_field(
                    field,
                    "missing",
                    "Field required",
                    None,
                )),
                None => {}
                Some(value) => {
                    if let Some(error) = check_kind(field, kind, value) {
                        errors.push(error);
                    } else if let ("age", Value::Number(n)) = (field, value) {
                        errors.extend(whole_number(n).and_then(check_age));
                    }
                }
            }
        }
        errors
    }
}

// ============ Response Models ============

/// Diabetic retinopathy severity, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DrStage {
    #[serde(rename = "No DR")]
    NoDr,
    #[serde(rename = "Mild NPDR")]
    MildNpdr,
    #[serde(rename = "Moderate NPDR")]
    ModerateNpdr,
    #[serde(rename = "Severe NPDR")]
    SevereNpdr,
    #[serde(rename = "PDR")]
    Pdr,
}

impl DrStage {
    /// All stages in their fixed reporting order.
    pub const ALL: [DrStage; 5] = [
        DrStage::NoDr,
        DrStage::MildNpdr,
        DrStage::ModerateNpdr,
        DrStage::SevereNpdr,
        DrStage::Pdr,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DrStage::NoDr => "No DR",
            DrStage::MildNpdr => "Mild NPDR",
            DrStage::ModerateNpdr => "Moderate NPDR",
            DrStage::SevereNpdr => "Severe NPDR",
            DrStage::Pdr => "PDR",
        }
    }
}

impl std::fmt::Display for DrStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability per stage, serialized as a JSON object in stage order.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDistribution(pub [f64; 5]);

impl StageDistribution {
    pub fn get(&self, stage: DrStage) -> f64 {
        self.0[stage as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DrStage, f64)> + '_ {
        DrStage::ALL.into_iter().zip(self.0.iter().copied())
    }
}

impl Serialize for StageDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (stage, probability) in self.iter() {
            map.serialize_entry(stage.label(), &probability)?;
        }
        map.end()
    }
}

/// Risk category derived from threshold rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
}

/// Likelihood of one complication.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RiskScore {
    /// Score in [0.0, 1.0].
    pub value: f64,
    pub category: RiskCategory,
    /// Fixed per risk type.
    pub confidence: f64,
}

/// One clinical feature's share of the explanation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FeatureContribution {
    pub feature_name: String,
    /// Raw ratio of the measurement to its reference scale.
    pub contribution: f64,
    /// Fixed weight; not derived from `contribution`.
    pub normalized_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExplanationData {
    pub image_contribution: f64,
    pub clinical_contribution: f64,
    pub top_image_features: Vec<String>,
    pub top_clinical_features: Vec<FeatureContribution>,
    pub natural_language_explanation: String,
}

/// Full report returned by `POST {prefix}/demo-analyze`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PredictionResponse {
    /// "demo_" followed by 12 hex characters.
    pub prediction_id: String,
    pub timestamp: DateTime<Utc>,
    pub dr_stage: DrStage,
    pub dr_stage_probability: f64,
    #[schema(value_type = Object)]
    pub dr_class_probabilities: StageDistribution,
    pub overall_risk_score: RiskScore,
    pub nephropathy_risk: RiskScore,
    pub neuropathy_risk: RiskScore,
    pub cardiovascular_risk: RiskScore,
    pub explanation: ExplanationData,
    pub recommendations: Vec<String>,
    pub follow_up_months: u8,
    pub model_version: String,
    pub processing_time_ms: f64,
}

// ============ Status Models ============

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceStatus {
    pub message: String,
    pub status: String,
}

/// Body of the top-level `GET /health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
}

/// Body of `GET {prefix}/health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PredictionHealth {
    pub status: String,
    /// Always true; no model is loaded.
    pub model_loaded: bool,
}
