//! Risk scoring for the demo analysis endpoint.
//!
//! Everything here is a pure function of [`ClinicalData`]: no clock, no
//! randomness, no I/O. The request-specific envelope (id, timestamp,
//! latency) is added by [`crate::services::PredictionService`].
//!
//! The pipeline:
//! 1. Derive a single risk factor from HbA1c and diabetes duration
//! 2. Spread it over the five DR stages and normalize
//! 3. Derive four complication risk scores from the same factor
//! 4. Build recommendations, follow-up interval and explanation

use std::fmt;

use crate::models::{
    ClinicalData, DrStage, ExplanationData, FeatureContribution, RiskCategory, RiskScore,
    StageDistribution,
};

/// Risk factor above which a patient is referred urgently.
pub const URGENT_THRESHOLD: f64 = 0.7;
/// Risk factor above which a specialist follow-up is scheduled.
pub const FOLLOW_UP_THRESHOLD: f64 = 0.4;

pub const IMAGE_CONTRIBUTION: f64 = 0.60;
pub const CLINICAL_CONTRIBUTION: f64 = 0.40;

pub const TOP_IMAGE_FEATURES: [&str; 3] = [
    "Microaneurysms detected",
    "Hard exudates present",
    "Retinal hemorrhages",
];

pub const MSG_GLYCEMIC_CONTROL: &str = "🎯 Improve glycemic control - Target HbA1c < 7%";
pub const MSG_BLOOD_PRESSURE: &str = "💊 Monitor and manage blood pressure";
pub const MSG_WEIGHT: &str = "🏃 Weight management recommended";
pub const MSG_SMOKING: &str = "🚭 Smoking cessation strongly recommended";
pub const MSG_URGENT_REFERRAL: &str = "👨‍⚕️ Urgent ophthalmologist consultation required";
pub const MSG_SCHEDULE_FOLLOW_UP: &str = "📅 Schedule follow-up with eye specialist";
pub const MSG_CONTINUE_PLAN: &str = "✅ Continue current management plan";

/// Multiplier, category thresholds and confidence for one complication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskProfile {
    pub multiplier: f64,
    pub high_above: f64,
    pub moderate_above: f64,
    pub confidence: f64,
}

pub const OVERALL: RiskProfile = RiskProfile {
    multiplier: 1.0,
    high_above: 0.7,
    moderate_above: 0.4,
    confidence: 0.88,
};

pub const NEPHROPATHY: RiskProfile = RiskProfile {
    multiplier: 1.1,
    high_above: 0.6,
    moderate_above: 0.3,
    confidence: 0.82,
};

pub const NEUROPATHY: RiskProfile = RiskProfile {
    multiplier: 0.9,
    high_above: 0.7,
    moderate_above: 0.4,
    confidence: 0.79,
};

pub const CARDIOVASCULAR: RiskProfile = RiskProfile {
    multiplier: 1.05,
    high_above: 0.65,
    moderate_above: 0.35,
    confidence: 0.84,
};

impl RiskProfile {
    /// Scores `risk_factor` under this profile.
    ///
    /// The category is decided on the unscaled risk factor; only the
    /// reported value carries the multiplier.
    pub fn score(&self, risk_factor: f64) -> RiskScore {
        let category = if risk_factor > self.high_above {
            RiskCategory::High
        } else if risk_factor > self.moderate_above {
            RiskCategory::Moderate
        } else {
            RiskCategory::Low
        };

        RiskScore {
            value: (risk_factor * self.multiplier).min(1.0),
            category,
            confidence: self.confidence,
        }
    }
}

/// Failure while deriving the report.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// A derived quantity overflowed or became NaN.
    NonFinite { quantity: &'static str, value: f64 },
}

impl fmt::Display for ScoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringError::NonFinite { quantity, value } => {
                write!(f, "{} is not a finite number ({})", quantity, value)
            }
        }
    }
}

impl std::error::Error for ScoringError {}

/// Everything the response carries except the per-request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub risk_factor: f64,
    pub dr_stage: DrStage,
    pub dr_stage_probability: f64,
    pub dr_class_probabilities: StageDistribution,
    pub overall_risk_score: RiskScore,
    pub nephropathy_risk: RiskScore,
    pub neuropathy_risk: RiskScore,
    pub cardiovascular_risk: RiskScore,
    pub explanation: ExplanationData,
    pub recommendations: Vec<String>,
    pub follow_up_months: u8,
}

/// Runs the whole scoring pipeline for one patient.
pub fn assess(data: &ClinicalData) -> Result<RiskAssessment, ScoringError> {
    let risk_factor = ensure_finite("risk_factor", risk_factor(data))?;

    let dr_class_probabilities = stage_distribution(risk_factor);
    for (_, probability) in dr_class_probabilities.iter() {
        ensure_finite("dr_class_probability", probability)?;
    }
    let (dr_stage, dr_stage_probability) = predicted_stage(&dr_class_probabilities);

    let explanation = explain(data, dr_stage);
    for feature in &explanation.top_clinical_features {
        ensure_finite("feature contribution", feature.contribution)?;
    }

    Ok(RiskAssessment {
        risk_factor,
        dr_stage,
        dr_stage_probability,
        dr_class_probabilities,
        overall_risk_score: OVERALL.score(risk_factor),
        nephropathy_risk: NEPHROPATHY.score(risk_factor),
        neuropathy_risk: NEUROPATHY.score(risk_factor),
        cardiovascular_risk: CARDIOVASCULAR.score(risk_factor),
        explanation,
        recommendations: recommendations(data, risk_factor),
        follow_up_months: follow_up_months(risk_factor),
    })
}

fn ensure_finite(quantity: &'static str, value: f64) -> Result<f64, ScoringError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScoringError::NonFinite { quantity, value })
    }
}

/// Blend of HbA1c and diabetes duration, capped at 1.0.
///
/// Only the upper end is clamped; negative measurements yield a negative factor.
pub fn risk_factor(data: &ClinicalData) -> f64 {
    let combined = (data.hba1c / 10.0 + data.diabetes_duration as f64 / 20.0) / 2.0;
    combined.min(1.0)
}

/// Unnormalized stage weights, in [`DrStage::ALL`] order.
pub fn stage_weights(risk_factor: f64) -> [f64; 5] {
    [
        (0.8 - risk_factor).max(0.0),
        0.1,
        0.05 + risk_factor * 0.2,
        0.05 + risk_factor * 0.3,
        risk_factor * 0.2,
    ]
}

/// Stage weights scaled to sum to 1.0.
pub fn stage_distribution(risk_factor: f64) -> StageDistribution {
    let weights = stage_weights(risk_factor);
    let total: f64 = weights.iter().sum();
    StageDistribution(weights.map(|w| w / total))
}

/// Most probable stage; ties go to the earliest stage.
pub fn predicted_stage(distribution: &StageDistribution) -> (DrStage, f64) {
    let mut best = (DrStage::NoDr, distribution.get(DrStage::NoDr));
    for (stage, probability) in distribution.iter().skip(1) {
        if probability > best.1 {
            best = (stage, probability);
        }
    }
    best
}

/// Advisory messages in fixed rule order, always ending with one risk-tier message.
pub fn recommendations(data: &ClinicalData, risk_factor: f64) -> Vec<String> {
    let mut recs = Vec::new();

    if data.hba1c > 7.0 {
        recs.push(MSG_GLYCEMIC_CONTROL);
    }
    if data.blood_pressure_systolic > 130 {
        recs.push(MSG_BLOOD_PRESSURE);
    }
    if data.bmi > 25.0 {
        recs.push(MSG_WEIGHT);
    }
    if data.smoking_status == "current" {
        recs.push(MSG_SMOKING);
    }

    recs.push(if risk_factor > URGENT_THRESHOLD {
        MSG_URGENT_REFERRAL
    } else if risk_factor > FOLLOW_UP_THRESHOLD {
        MSG_SCHEDULE_FOLLOW_UP
    } else {
        MSG_CONTINUE_PLAN
    });

    recs.into_iter().map(str::to_string).collect()
}

pub fn follow_up_months(risk_factor: f64) -> u8 {
    if risk_factor > URGENT_THRESHOLD {
        1
    } else if risk_factor > FOLLOW_UP_THRESHOLD {
        3
    } else {
        6
    }
}

/// Static image/clinical split plus the three clinical drivers.
///
/// `normalized_contribution` values are fixed weights and intentionally
/// independent of the raw `contribution` ratios.
pub fn explain(data: &ClinicalData, stage: DrStage) -> ExplanationData {
    let top_clinical_features = vec![
        FeatureContribution {
            feature_name: "HbA1c Level".to_string(),
            contribution: data.hba1c / 15.0,
            normalized_contribution: 0.35,
        },
        FeatureContribution {
            feature_name: "Diabetes Duration".to_string(),
            contribution: data.diabetes_duration as f64 / 50.0,
            normalized_contribution: 0.25,
        },
        FeatureContribution {
            feature_name: "Blood Glucose".to_string(),
            contribution: data.blood_glucose / 500.0,
            normalized_contribution: 0.20,
        },
    ];

    ExplanationData {
        image_contribution: IMAGE_CONTRIBUTION,
        clinical_contribution: CLINICAL_CONTRIBUTION,
        top_image_features: TOP_IMAGE_FEATURES.iter().map(|s| s.to_string()).collect(),
        top_clinical_features,
        natural_language_explanation: narrative(data, stage),
    }
}

fn narrative(data: &ClinicalData, stage: DrStage) -> String {
    let control = if data.hba1c > 7.0 { "poor" } else { "good" };
    let significance = if data.diabetes_duration > 10 {
        "a significant"
    } else {
        "a moderate"
    };

    format!(
        "Patient shows {} with HbA1c of {}% indicating {} glycemic control. \
         Diabetes duration of {} years is {} risk factor.",
        stage,
        format_measurement(data.hba1c),
        control,
        data.diabetes_duration,
        significance
    )
}

/// Renders a measurement for the explanation sentence.
///
/// Whole values keep one decimal place (`8.0`). Magnitudes below 1e-4 or
/// from 1e16 up switch to exponent form with a signed two-digit exponent
/// (`1e-05`, `1.5e+16`).
fn format_measurement(value: f64) -> String {
    let magnitude = value.abs();
    if !value.is_finite() {
        format!("{}", value)
    } else if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{:e}", value);
        match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => text,
        }
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(hba1c: f64, diabetes_duration: i64) -> ClinicalData {
        ClinicalData {
            age: 60,
            gender: "male".to_string(),
            bmi: 22.0,
            hba1c,
            blood_glucose: 150.0,
            blood_pressure_systolic: 120,
            blood_pressure_diastolic: 80,
            diabetes_duration,
            creatinine: 1.0,
            cholesterol_total: 190.0,
            cholesterol_ldl: 110.0,
            cholesterol_hdl: 50.0,
            triglycerides: 140.0,
            has_hypertension: false,
            smoking_status: "never".to_string(),
            family_history: false,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_reference_patient() {
        let mut data = patient(9.5, 15);
        data.blood_pressure_systolic = 140;
        data.bmi = 30.0;
        data.smoking_status = "current".to_string();

        let report = assess(&data).unwrap();

        assert!(approx(report.risk_factor, 0.85));
        let probs = &report.dr_class_probabilities;
        assert!(approx(probs.get(DrStage::NoDr), 0.0));
        assert!(approx(probs.get(DrStage::MildNpdr), 0.1 / 0.795));
        assert!(approx(probs.get(DrStage::ModerateNpdr), 0.22 / 0.795));
        assert!(approx(probs.get(DrStage::SevereNpdr), 0.305 / 0.795));
        assert!(approx(probs.get(DrStage::Pdr), 0.17 / 0.795));
        assert_eq!(report.dr_stage, DrStage::SevereNpdr);
        assert!(approx(report.dr_stage_probability, 0.305 / 0.795));

        assert_eq!(
            report.recommendations,
            vec![
                MSG_GLYCEMIC_CONTROL,
                MSG_BLOOD_PRESSURE,
                MSG_WEIGHT,
                MSG_SMOKING,
                MSG_URGENT_REFERRAL
            ]
        );
        assert_eq!(report.follow_up_months, 1);
        assert_eq!(report.overall_risk_score.category, RiskCategory::High);
        assert!(approx(report.overall_risk_score.value, 0.85));
        assert!(approx(report.nephropathy_risk.value, 0.935));
        assert!(approx(report.neuropathy_risk.value, 0.765));
        assert!(approx(report.cardiovascular_risk.value, 0.8925));
    }

    #[test]
    fn test_risk_factor_is_capped() {
        assert_eq!(risk_factor(&patient(40.0, 60)), 1.0);
        assert_eq!(risk_factor(&patient(1e300, 1_000_000)), 1.0);
    }

    #[test]
    fn test_low_risk_patient_keeps_plan() {
        let report = assess(&patient(5.0, 2)).unwrap();
        // (0.5 + 0.1) / 2
        assert!(approx(report.risk_factor, 0.3));
        assert_eq!(report.dr_stage, DrStage::NoDr);
        assert_eq!(report.recommendations, vec![MSG_CONTINUE_PLAN]);
        assert_eq!(report.follow_up_months, 6);
        assert_eq!(report.overall_risk_score.category, RiskCategory::Low);
        assert_eq!(report.nephropathy_risk.category, RiskCategory::Low);
        assert_eq!(report.cardiovascular_risk.category, RiskCategory::Low);
    }

    #[test]
    fn test_tier_boundaries_are_exclusive() {
        // hba1c 8.0, duration 0 -> exactly 0.4
        let rf = risk_factor(&patient(8.0, 0));
        assert_eq!(rf, 0.4);
        assert_eq!(follow_up_months(rf), 6);
        assert_eq!(OVERALL.score(rf).category, RiskCategory::Low);
        assert_eq!(NEPHROPATHY.score(rf).category, RiskCategory::Moderate);
        assert_eq!(CARDIOVASCULAR.score(rf).category, RiskCategory::Moderate);

        assert_eq!(follow_up_months(0.41), 3);
        assert_eq!(follow_up_months(0.7), 3);
        assert_eq!(follow_up_months(0.71), 1);
    }

    #[test]
    fn test_category_thresholds_per_profile() {
        assert_eq!(NEPHROPATHY.score(0.61).category, RiskCategory::High);
        assert_eq!(NEPHROPATHY.score(0.31).category, RiskCategory::Moderate);
        assert_eq!(NEPHROPATHY.score(0.3).category, RiskCategory::Low);
        assert_eq!(NEUROPATHY.score(0.71).category, RiskCategory::High);
        assert_eq!(NEUROPATHY.score(0.5).category, RiskCategory::Moderate);
        assert_eq!(CARDIOVASCULAR.score(0.66).category, RiskCategory::High);
        assert_eq!(CARDIOVASCULAR.score(0.36).category, RiskCategory::Moderate);
        assert_eq!(CARDIOVASCULAR.score(0.35).category, RiskCategory::Low);
    }

    #[test]
    fn test_scores_clamped_to_one() {
        assert_eq!(NEPHROPATHY.score(1.0).value, 1.0);
        assert_eq!(CARDIOVASCULAR.score(0.99).value, 1.0);
        assert!(approx(NEUROPATHY.score(1.0).value, 0.9));
    }

    #[test]
    fn test_argmax_prefers_first_on_tie() {
        let dist = StageDistribution([0.3, 0.3, 0.2, 0.1, 0.1]);
        assert_eq!(predicted_stage(&dist), (DrStage::NoDr, 0.3));

        let dist = StageDistribution([0.1, 0.2, 0.35, 0.35, 0.0]);
        assert_eq!(predicted_stage(&dist).0, DrStage::ModerateNpdr);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        for rf in [0.0, 0.25, 0.5, 0.8, 1.0] {
            let dist = stage_distribution(rf);
            let total: f64 = dist.0.iter().sum();
            assert!(approx(total, 1.0), "rf={} total={}", rf, total);
        }
    }

    #[test]
    fn test_feature_contributions_stay_decoupled() {
        let explanation = explain(&patient(12.0, 25), DrStage::Pdr);
        let features = &explanation.top_clinical_features;
        assert_eq!(features.len(), 3);
        assert!(approx(features[0].contribution, 0.8));
        assert_eq!(features[0].normalized_contribution, 0.35);
        assert!(approx(features[1].contribution, 0.5));
        assert_eq!(features[1].normalized_contribution, 0.25);
        assert!(approx(features[2].contribution, 0.3));
        assert_eq!(features[2].normalized_contribution, 0.20);
        assert_eq!(explanation.image_contribution, 0.60);
        assert_eq!(explanation.clinical_contribution, 0.40);
        assert_eq!(explanation.top_image_features, TOP_IMAGE_FEATURES);
    }

    #[test]
    fn test_narrative_wording() {
        let poor = narrative(&patient(9.5, 15), DrStage::SevereNpdr);
        assert_eq!(
            poor,
            "Patient shows Severe NPDR with HbA1c of 9.5% indicating poor glycemic control. \
             Diabetes duration of 15 years is a significant risk factor."
        );

        let good = narrative(&patient(6.0, 10), DrStage::NoDr);
        assert_eq!(
            good,
            "Patient shows No DR with HbA1c of 6.0% indicating good glycemic control. \
             Diabetes duration of 10 years is a moderate risk factor."
        );
    }

    #[test]
    fn test_measurement_rendering() {
        assert_eq!(format_measurement(0.0), "0.0");
        assert_eq!(format_measurement(7.0), "7.0");
        assert_eq!(format_measurement(9.5), "9.5");
        assert_eq!(format_measurement(0.0001), "0.0001");
        assert_eq!(format_measurement(0.00001), "1e-05");
        assert_eq!(format_measurement(-1.25e-7), "-1.25e-07");
        assert_eq!(format_measurement(9999999999999998.0), "9999999999999998.0");
        assert_eq!(format_measurement(1e16), "1e+16");
        assert_eq!(format_measurement(1.5e16), "1.5e+16");
        assert_eq!(format_measurement(2.5e300), "2.5e+300");
    }

    #[test]
    fn test_overflowing_input_is_a_computation_error() {
        let mut data = patient(6.0, 5);
        data.blood_glucose = f64::MAX * 1000.0;
        let err = assess(&data).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::NonFinite { quantity: "feature contribution", .. }
        ));
        assert!(err.to_string().contains("not a finite number"));
    }
}
