use std::sync::Arc;

use crate::models::{ClinicalData, PredictionResponse};
use crate::provider::{RuntimeProvider, SystemProvider};
use crate::scoring::{self, ScoringError};

/// Default model tag reported with each prediction.
pub const DEFAULT_MODEL_VERSION: &str = "v1.0.0-demo";

/// Turns clinical measurements into a full prediction report.
///
/// Holds no mutable state; cloning shares the provider.
#[derive(Clone)]
pub struct PredictionService {
    provider: Arc<dyn RuntimeProvider>,
    model_version: String,
}

impl PredictionService {
    pub fn new(provider: Arc<dyn RuntimeProvider>, model_version: impl Into<String>) -> Self {
        Self {
            provider,
            model_version: model_version.into(),
        }
    }

    /// Service backed by the system clock and random ids.
    pub fn with_system_provider(model_version: impl Into<String>) -> Self {
        Self::new(Arc::new(SystemProvider), model_version)
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Scores `data` and wraps the result with id, timestamp and latency.
    pub fn estimate(&self, data: &ClinicalData) -> Result<PredictionResponse, ScoringError> {
        let started = self.provider.now();
        let assessment = scoring::assess(data)?;
        let finished = self.provider.now();

        let processing_time_ms = (finished - started)
            .num_microseconds()
            .map(|us| us.max(0) as f64 / 1000.0)
            .unwrap_or(0.0);

        tracing::debug!(
            risk_factor = assessment.risk_factor,
            dr_stage = %assessment.dr_stage,
            follow_up_months = assessment.follow_up_months,
            "Risk assessment computed"
        );

        Ok(PredictionResponse {
            prediction_id: self.provider.prediction_id(),
            timestamp: finished,
            dr_stage: assessment.dr_stage,
            dr_stage_probability: assessment.dr_stage_probability,
            dr_class_probabilities: assessment.dr_class_probabilities,
            overall_risk_score: assessment.overall_risk_score,
            nephropathy_risk: assessment.nephropathy_risk,
            neuropathy_risk: assessment.neuropathy_risk,
            cardiovascular_risk: assessment.cardiovascular_risk,
            explanation: assessment.explanation,
            recommendations: assessment.recommendations,
            follow_up_months: assessment.follow_up_months,
            model_version: self.model_version.clone(),
            processing_time_ms,
        })
    }
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("model_version", &self.model_version)
            .finish_non_exhaustive()
    }
}
