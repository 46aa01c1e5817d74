use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::config::TransitConfig;
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, FetchError, HttpClient, fetch_json};
use crate::services::transit_api::TransitApi;

pub const API_KEY_HEADER: &str = "x-umo-iq-api-key";

pub struct UmoIqClient {
    http: Box<dyn HttpClient>,
    base_url: Url,
    agency: String,
}

impl UmoIqClient {
    pub fn new(config: &TransitConfig) -> Result<Self, FetchError> {
        let basic = BasicClient::with_timeout(config.timeout)?;
        let http = ApiKey::new(basic, API_KEY_HEADER, &config.api_key)?;
        Self::with_client(http, &config.base_url, &config.agency)
    }

    /// Builds a client over any [`HttpClient`]. The caller is responsible
    /// for attaching the API key.
    pub fn with_client<C: HttpClient + 'static>(
        http: C,
        base_url: &str,
        agency: &str,
    ) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Box::new(http),
            base_url,
            agency: agency.to_string(),
        })
    }

    /// Appends percent-encoded path segments to the base url.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: Url) -> Result<Value, FetchError> {
        debug!(%url, "UmoIQ request");
        fetch_json(&self.http, url.as_str()).await
    }
}

#[async_trait]
impl TransitApi for UmoIqClient {
    async fn agencies(&self) -> Result<Value, FetchError> {
        self.get(self.url(&["agencies"])).await
    }

    async fn routes(&self) -> Result<Value, FetchError> {
        self.get(self.url(&["agencies", self.agency.as_str(), "routes"]))
            .await
    }

    async fn route_stops(&self, route_id: &str) -> Result<Value, FetchError> {
        self.get(self.url(&["agencies", self.agency.as_str(), "routes", route_id, "stops"]))
            .await
    }

    async fn predictions(&self, stop_id: &str, route_id: Option<&str>) -> Result<Value, FetchError> {
        let url = match route_id {
            Some(route_id) => self.url(&[
                "agencies",
                self.agency.as_str(),
                "routes",
                route_id,
                "stops",
                stop_id,
                "predictions",
            ]),
            None => self.url(&["agencies", self.agency.as_str(), "stops", stop_id, "predictions"]),
        };
        self.get(url).await
    }

    async fn predictions_near(&self, lat: f64, lon: f64) -> Result<Value, FetchError> {
        let mut url = self.url(&["agencies", self.agency.as_str(), "predictions-near"]);
        url.query_pairs_mut()
            .append_pair("lat", &format!("{lat:.6}"))
            .append_pair("lon", &format!("{lon:.6}"));
        self.get(url).await
    }
}
