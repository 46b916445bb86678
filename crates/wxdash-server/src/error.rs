//! Mapping of domain errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use wxdash_analysis::AnalyzerError;
use wxdash_core::AnalysisError;
use wxdash_ingest::IngestError;
use wxdash_store::StorageError;

#[derive(Debug)]
pub enum ApiError {
    Analyzer(AnalyzerError),
    Ingest(IngestError),
    BadRequest(String),
    Internal(String),
}

impl From<AnalyzerError> for ApiError {
    fn from(e: AnalyzerError) -> Self {
        ApiError::Analyzer(e)
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        ApiError::Ingest(e)
    }
}

impl ApiError {
    /// Status code and machine-readable kind
    pub fn classify(&self) -> (StatusCode, &'static str) {
        let unprocessable = StatusCode::UNPROCESSABLE_ENTITY;
        match self {
            ApiError::Analyzer(AnalyzerError::Analysis(e)) => match e {
                AnalysisError::InsufficientData { .. } => (unprocessable, "insufficient_data"),
                AnalysisError::UnitMismatch { .. } => (unprocessable, "unit_mismatch"),
                AnalysisError::OutOfOrder { .. } => (unprocessable, "out_of_order"),
                AnalysisError::NonFiniteTemperature { .. } => {
                    (unprocessable, "non_finite_temperature")
                }
                AnalysisError::InvalidParameter(_) => (unprocessable, "invalid_parameter"),
            },
            ApiError::Analyzer(AnalyzerError::Storage(e)) => match e {
                StorageError::InvalidObservation(_) => (unprocessable, "invalid_observation"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            },
            ApiError::Ingest(e) => match e {
                IngestError::CityNotFound(_) => (StatusCode::NOT_FOUND, "city_not_found"),
                IngestError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
                IngestError::InvalidApiKey => (StatusCode::BAD_GATEWAY, "invalid_api_key"),
                IngestError::Timeout { .. } => (StatusCode::BAD_GATEWAY, "timeout"),
                IngestError::Network(_) => (StatusCode::BAD_GATEWAY, "network"),
                IngestError::Http { .. } => (StatusCode::BAD_GATEWAY, "upstream_http"),
                IngestError::InvalidResponse(_) => (StatusCode::BAD_GATEWAY, "invalid_response"),
                IngestError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Analyzer(e) => e.to_string(),
            ApiError::Ingest(e) => e.to_string(),
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(kind, %message, "request failed");
        } else {
            tracing::debug!(kind, %message, "request rejected");
        }

        let body = serde_json::json!({ "error": kind, "message": message });
        (status, Json(body)).into_response()
    }
}
