//! History analysis
//!
//! Connects the observation store to the statistics aggregator and trend
//! detector, mirroring the record → query → analyze flow of the dashboard.

pub mod analyzer;
pub mod report;

pub use analyzer::*;
pub use report::*;

use thiserror::Error;
use wxdash_core::AnalysisError;
use wxdash_store::StorageError;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
