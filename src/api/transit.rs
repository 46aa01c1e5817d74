use axum::Json;
use axum::extract::{Path, Query, State};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::normalize::{Agency, PredictionBundle, Route, Stop, StopMatch};
use crate::services::transit::BundleOrder;
use crate::state::AppState;

type Params = Query<HashMap<String, String>>;

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

pub async fn agency(State(state): State<Arc<AppState>>) -> Result<Json<Agency>, ApiError> {
    Ok(Json(state.transit.agency().await?))
}

pub async fn routes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Route>>, ApiError> {
    Ok(Json(state.transit.routes().await?))
}

pub async fn stops(
    State(state): State<Arc<AppState>>,
    Path(route): Path<String>,
) -> Result<Json<Vec<Stop>>, ApiError> {
    Ok(Json(state.transit.stops(Some(&route)).await?))
}

pub async fn predictions(
    Query(params): Params,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PredictionBundle>>, ApiError> {
    let bundles = state
        .transit
        .predictions(param(&params, "stop"), param(&params, "route"))
        .await?;
    Ok(Json(bundles))
}

pub async fn predictions_near(
    Query(params): Params,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PredictionBundle>>, ApiError> {
    let order = match param(&params, "sort") {
        None | Some("") => BundleOrder::Upstream,
        Some("soonest") => BundleOrder::Soonest,
        Some(other) => return Err(ApiError::bad_request(format!("Unknown sort {other:?}"))),
    };
    let limit = match param(&params, "limit") {
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|_| ApiError::bad_request("Invalid limit parameter"))?,
        ),
        None => None,
    };
    let bundles = state
        .transit
        .predictions_near(param(&params, "lat"), param(&params, "lon"), order, limit)
        .await?;
    Ok(Json(bundles))
}

pub async fn search_stops(
    Query(params): Params,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StopMatch>>, ApiError> {
    Ok(Json(
        state.transit.search_stops(param(&params, "query")).await?,
    ))
}
