//! Diabetic Retinopathy Risk API Library
//!
//! Scores structured clinical measurements for a diabetic patient and returns
//! a synthesized report: a DR stage distribution, four complication risk
//! scores, an explanation block and follow-up recommendations. No model is
//! loaded; every figure is deterministic arithmetic on the input.
//!
//! # Modules
//!
//! - `config`: Environment configuration.
//! - `docs`: OpenAPI document and Swagger UI.
//! - `errors`: Error types and their HTTP mapping.
//! - `extract`: Validating JSON extractor.
//! - `handlers`: HTTP request handlers and shared state.
//! - `models`: Request/response data models.
//! - `provider`: Clock and prediction-id source.
//! - `router`: Application router construction.
//! - `scoring`: Pure risk scoring.
//! - `services`: Prediction service combining scoring and provider.

pub mod config;
pub mod docs;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod router;
pub mod scoring;
pub mod services;

pub use router::build_router;
