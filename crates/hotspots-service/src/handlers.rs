use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hotspots_core::params::{parse_geo_precision, parse_time_precision, parse_timestamp, DEFAULT_GEO_PRECISION};
use hotspots_core::{Aggregate, AggregatesReqParams};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{AppError, ServiceError};
use crate::service::{Cacher, Repoer};
use crate::AppState;

/// Parse a request body into the closed, unknown-field-rejecting shape
/// expected by the insert/upsert handlers. Any parse failure — malformed
/// JSON, an unexpected field, a wrong type — is reported the same way:
/// a 422, not axum's default 400/415 for a failed `Json` extraction.
fn parse_aggregates_body(body: &[u8]) -> Result<Vec<Aggregate>, ServiceError> {
    serde_json::from_slice(body).map_err(|e| ServiceError::InvalidParams(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct RawQueryParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub time_precision: Option<String>,
    pub geo_precision: Option<String>,
}

fn parse_req_params(raw: RawQueryParams, now: chrono::DateTime<chrono::Utc>) -> Result<AggregatesReqParams, ServiceError> {
    let end_time = match raw.end_time {
        Some(ref s) => parse_timestamp(s).map_err(|e| ServiceError::InvalidParams(e.to_string()))?,
        None => AggregatesReqParams::default_end_time(now),
    };
    let start_time = match raw.start_time {
        Some(ref s) => parse_timestamp(s).map_err(|e| ServiceError::InvalidParams(e.to_string()))?,
        None => AggregatesReqParams::default_start_time(),
    };
    let time_precision = match raw.time_precision {
        Some(ref s) => parse_time_precision(s).map_err(|e| ServiceError::InvalidParams(e.to_string()))?,
        None => parse_time_precision("1m").expect("1m is always valid"),
    };
    let geo_precision = match raw.geo_precision {
        Some(ref s) => parse_geo_precision(s).map_err(|e| ServiceError::InvalidParams(e.to_string()))?,
        None => DEFAULT_GEO_PRECISION as usize,
    };

    Ok(AggregatesReqParams {
        start_time,
        end_time,
        time_precision,
        geo_precision,
    })
}

pub async fn handle_get_aggregates<R, C>(
    State(state): State<AppState<R, C>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Response, AppError>
where
    R: Repoer + Send + Sync + 'static,
    C: Cacher + Send + Sync + 'static,
{
    let raw_params = RawQueryParams {
        start_time: raw.get("start_time").cloned(),
        end_time: raw.get("end_time").cloned(),
        time_precision: raw.get("time_precision").cloned(),
        geo_precision: raw.get("geo_precision").cloned(),
    };

    let params = parse_req_params(raw_params, chrono::Utc::now())?;
    let result = state.service.get_aggregates(&params).await?;
    Ok(Json(result).into_response())
}

pub async fn handle_insert_aggregates<R, C>(
    State(state): State<AppState<R, C>>,
    body: Bytes,
) -> Result<Response, AppError>
where
    R: Repoer + Send + Sync + 'static,
    C: Cacher + Send + Sync + 'static,
{
    let items = parse_aggregates_body(&body)?;
    state.service.insert_aggregates(&items).await?;
    Ok(StatusCode::OK.into_response())
}

pub async fn handle_upsert_aggregates<R, C>(
    State(state): State<AppState<R, C>>,
    body: Bytes,
) -> Result<Response, AppError>
where
    R: Repoer + Send + Sync + 'static,
    C: Cacher + Send + Sync + 'static,
{
    let items = parse_aggregates_body(&body)?;
    state.service.upsert_aggregates(&items).await?;
    Ok(StatusCode::OK.into_response())
}

pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
