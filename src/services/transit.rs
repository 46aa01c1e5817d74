//! Transit read operations: validation, normalization and stop search.

use futures_util::{StreamExt, TryStreamExt, stream};
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TransitConfig;
use crate::error::ApiError;
use crate::normalize::{self, Agency, PredictionBundle, Route, Stop, StopMatch};
use crate::services::transit_api::TransitApi;

/// Upper bound on stop search results.
pub const SEARCH_LIMIT: usize = 10;

/// Ordering applied to prediction bundles before they are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BundleOrder {
    /// As received from upstream.
    #[default]
    Upstream,
    /// Soonest next arrival first.
    Soonest,
}

pub struct TransitService {
    api: Arc<dyn TransitApi>,
    agency_keywords: Vec<String>,
    search_concurrency: usize,
}

fn required<'a>(value: Option<&'a str>, msg: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(msg)),
    }
}

fn coordinate(value: Option<&str>, name: &str) -> Result<f64, ApiError> {
    let raw = required(value, "Missing lat or lon parameter")?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {name} parameter")))
}

impl TransitService {
    pub fn new(api: Arc<dyn TransitApi>, config: &TransitConfig) -> Self {
        Self {
            api,
            agency_keywords: config.agency_keywords.clone(),
            search_concurrency: config.search_concurrency.max(1),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn agency(&self) -> Result<Agency, ApiError> {
        let agencies = self.api.agencies().await?;
        normalize::select_agency(&agencies, &self.agency_keywords)
            .ok_or_else(|| ApiError::not_found("Unitrans agency not found"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn routes(&self) -> Result<Vec<Route>, ApiError> {
        let payload = self.api.routes().await?;
        Ok(normalize::routes(&payload))
    }

    #[tracing::instrument(skip(self))]
    pub async fn stops(&self, route_id: Option<&str>) -> Result<Vec<Stop>, ApiError> {
        let route_id = required(route_id, "Missing route parameter")?;
        let payload = self.api.route_stops(route_id).await?;
        Ok(normalize::stops(&payload, route_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn predictions(
        &self,
        stop_id: Option<&str>,
        route_id: Option<&str>,
    ) -> Result<Vec<PredictionBundle>, ApiError> {
        let stop_id = required(stop_id, "Missing stop parameter")?;
        let route_id = route_id.map(str::trim).filter(|r| !r.is_empty());
        let payload = self.api.predictions(stop_id, route_id).await?;
        Ok(normalize::bundles(&payload))
    }

    /// Predictions around a point, optionally ordered by soonest arrival and
    /// cut to `limit` bundles.
    #[tracing::instrument(skip(self))]
    pub async fn predictions_near(
        &self,
        lat: Option<&str>,
        lon: Option<&str>,
        order: BundleOrder,
        limit: Option<usize>,
    ) -> Result<Vec<PredictionBundle>, ApiError> {
        let lat = coordinate(lat, "lat")?;
        let lon = coordinate(lon, "lon")?;
        let payload = self.api.predictions_near(lat, lon).await?;

        let mut bundles = normalize::bundles(&payload);
        if order == BundleOrder::Soonest {
            normalize::sort_soonest(&mut bundles);
        }
        if let Some(limit) = limit {
            bundles.truncate(limit);
        }
        debug!(bundles = bundles.len(), "Nearby predictions normalized");
        Ok(bundles)
    }

    /// Case-insensitive substring search over stop names across all routes.
    ///
    /// Route stop lists are fetched with at most `search_concurrency`
    /// requests in flight. Results keep upstream route and stop order, and
    /// fetching stops once [`SEARCH_LIMIT`] matches are found. An upstream
    /// failure on any route read before that point fails the whole search.
    #[tracing::instrument(skip(self))]
    pub async fn search_stops(&self, query: Option<&str>) -> Result<Vec<StopMatch>, ApiError> {
        let query = required(query, "Missing query parameter")?;
        let needle = query.to_lowercase();

        let routes = self.api.routes().await?;
        let route_ids = normalize::route_ids(&routes);

        let api = &self.api;
        let mut per_route = pin!(
            stream::iter(route_ids)
                .map(|route_id| async move {
                    let payload = api.route_stops(&route_id).await?;
                    Ok::<_, ApiError>((route_id, payload))
                })
                .buffered(self.search_concurrency)
        );

        let mut matches = Vec::new();
        while let Some((route_id, payload)) = per_route.try_next().await? {
            matches.extend(normalize::matching_stops(&payload, &route_id, &needle));
            if matches.len() >= SEARCH_LIMIT {
                // Routes after this point are never awaited, so their
                // failures cannot fail the search.
                break;
            }
        }
        matches.truncate(SEARCH_LIMIT);

        info!(query, matches = matches.len(), "Stop search finished");
        Ok(matches)
    }
}
