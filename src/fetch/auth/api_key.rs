use crate::fetch::FetchError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// `header_name` is the header field to set (e.g. `x-umo-iq-api-key` or
/// Supabase's `apikey`). A header already present on the request is left
/// alone, so wrappers can be stacked and a per-request `Authorization`
/// survives a service-level bearer wrapper.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    key: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self, FetchError> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(header_name.to_string()))?;
        let mut key = HeaderValue::from_str(key)
            .map_err(|_| FetchError::InvalidHeader(header_name.to_string()))?;
        key.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            key,
        })
    }

    /// Convenience constructor that uses `Authorization: Bearer <key>`.
    pub fn bearer(inner: C, key: &str) -> Result<Self, FetchError> {
        Self::new(inner, AUTHORIZATION.as_str(), &format!("Bearer {key}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if !req.headers().contains_key(&self.header_name) {
            req.headers_mut()
                .insert(self.header_name.clone(), self.key.clone());
        }
        self.inner.execute(req).await
    }
}
