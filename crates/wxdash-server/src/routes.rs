//! `/api/v1` handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use wxdash_analysis::{AnalyzerResult, HistoryAnalyzer, HistoryReport};
use wxdash_core::{
    normalize, Observation, ObservationSet, StatisticsSummary, TemperatureUnit, TrendResult,
};
use wxdash_store::HistoryQuery;

use crate::{ApiError, AppState};

type ApiResult<T> = Result<T, ApiError>;

/// Run store-bound analyzer work on the blocking pool
async fn blocking<T, F>(state: &AppState, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&HistoryAnalyzer) -> AnalyzerResult<T> + Send + 'static,
{
    let analyzer = Arc::clone(state.analyzer());
    tokio::task::spawn_blocking(move || work(&analyzer))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn parse_unit(raw: Option<&str>) -> ApiResult<Option<TemperatureUnit>> {
    raw.map(|s| s.parse::<TemperatureUnit>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    city: String,
    unit: Option<String>,
}

pub async fn fetch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FetchRequest>,
) -> ApiResult<(StatusCode, Json<Observation>)> {
    state.count_request("fetch");
    let unit = parse_unit(req.unit.as_deref())?.unwrap_or(state.default_unit);

    let observation = state.source.current(&req.city, unit).await?;
    tracing::info!(
        city = %observation.city,
        temperature = observation.temperature,
        source = state.source.name(),
        "Fetched current weather"
    );

    let to_store = observation.clone();
    blocking(&state, move |a| a.record(&to_store)).await?;
    state.count_recorded(1);

    Ok((StatusCode::CREATED, Json(observation)))
}

#[derive(Debug, Deserialize)]
pub struct ForecastParams {
    city: String,
    unit: Option<String>,
}

pub async fn forecast(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ForecastParams>,
) -> ApiResult<Json<Vec<Observation>>> {
    state.count_request("forecast");
    let unit = parse_unit(q.unit.as_deref())?.unwrap_or(state.default_unit);
    let entries = state.source.forecast(&q.city, unit).await?;
    Ok(Json(entries))
}

pub async fn record(
    State(state): State<Arc<AppState>>,
    Json(observation): Json<Observation>,
) -> ApiResult<(StatusCode, Json<Observation>)> {
    state.count_request("observations");
    let to_store = observation.clone();
    blocking(&state, move |a| a.record(&to_store)).await?;
    state.count_recorded(1);
    Ok((StatusCode::CREATED, Json(observation)))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    city: Option<String>,
    limit: Option<usize>,
    since: Option<DateTime<Utc>>,
    unit: Option<String>,
}

impl HistoryParams {
    fn to_query(&self) -> HistoryQuery {
        HistoryQuery {
            city: self.city.clone(),
            limit: self.limit,
            since: self.since,
        }
    }
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryParams>,
) -> ApiResult<Json<ObservationSet>> {
    state.count_request("history");
    let normalize_to = parse_unit(q.unit.as_deref())?;
    let query = q.to_query();
    let set = blocking(&state, move |a| a.history(&query)).await?;
    Ok(Json(match normalize_to {
        Some(unit) => normalize(&set, unit),
        None => set,
    }))
}

pub async fn clear_history(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    state.count_request("clear_history");
    let deleted = blocking(&state, |a| a.clear()).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn cities(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    state.count_request("cities");
    let cities = blocking(&state, |a| a.cities()).await?;
    Ok(Json(cities))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryParams>,
) -> ApiResult<Json<StatisticsSummary>> {
    state.count_request("stats");
    let normalize_to = parse_unit(q.unit.as_deref())?;
    let query = q.to_query();
    let summary = blocking(&state, move |a| a.statistics(&query, normalize_to)).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    city: String,
    window: Option<usize>,
    unit: Option<String>,
}

pub async fn trend(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TrendParams>,
) -> ApiResult<Json<TrendResult>> {
    state.count_request("trend");
    let normalize_to = parse_unit(q.unit.as_deref())?;
    let result = blocking(&state, move |a| a.trend(&q.city, q.window, normalize_to)).await?;
    Ok(Json(result))
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TrendParams>,
) -> ApiResult<Json<HistoryReport>> {
    state.count_request("report");
    let normalize_to = parse_unit(q.unit.as_deref())?;
    let report = blocking(&state, move |a| a.report(&q.city, q.window, normalize_to)).await?;
    Ok(Json(report))
}
