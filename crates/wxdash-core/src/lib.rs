//! Core data types, unit handling, statistics and trend detection for WxDash
//!
//! Everything in this crate is synchronous and side-effect free. Callers hand
//! in an [`ObservationSet`] and get a derived summary back, or an
//! [`AnalysisError`] explaining why the set cannot be analyzed.

pub mod stats;
pub mod trend;
pub mod types;
pub mod units;

pub use stats::*;
pub use trend::*;
pub use types::*;
pub use units::*;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {operation} needs at least {required} observation(s), got {available}")]
    InsufficientData {
        operation: &'static str,
        required: usize,
        available: usize,
    },

    #[error("Unit mismatch: expected {expected} temperatures, found {found}")]
    UnitMismatch {
        expected: TemperatureUnit,
        found: TemperatureUnit,
    },

    #[error("Observation at index {index} is older than its predecessor")]
    OutOfOrder { index: usize },

    #[error("Observation at index {index} has a non-finite temperature")]
    NonFiniteTemperature { index: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
