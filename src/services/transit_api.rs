//! Trait for the raw transit-prediction source.

use crate::fetch::FetchError;
use serde_json::Value;

/// Abstraction over a transit-prediction provider (e.g., UmoIQ).
///
/// Methods return the provider's JSON untouched; shaping it is the job of
/// [`crate::normalize`].
#[async_trait::async_trait]
pub trait TransitApi: Send + Sync {
    /// All agencies the provider knows about.
    async fn agencies(&self) -> Result<Value, FetchError>;

    /// Routes of the configured agency.
    async fn routes(&self) -> Result<Value, FetchError>;

    /// Stops served by `route_id`.
    async fn route_stops(&self, route_id: &str) -> Result<Value, FetchError>;

    /// Prediction bundles for a stop, optionally narrowed to one route.
    async fn predictions(&self, stop_id: &str, route_id: Option<&str>) -> Result<Value, FetchError>;

    /// Prediction bundles for stops around a point.
    async fn predictions_near(&self, lat: f64, lon: f64) -> Result<Value, FetchError>;
}
