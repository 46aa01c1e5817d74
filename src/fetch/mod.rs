//! Outbound HTTP plumbing shared by the transit and store clients.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Upstream bodies are cut to this many characters before they are surfaced.
pub const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {0:?}")]
    InvalidUrl(String),

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("upstream returned invalid JSON: {body}")]
    InvalidJson { status: StatusCode, body: String },
}

impl FetchError {
    /// Upstream status, when the request got far enough to have one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } | FetchError::InvalidJson { status, .. } => {
                Some(*status)
            }
            FetchError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

pub(crate) fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Builds a request, serializing `body` as JSON when present.
pub fn build_request(method: Method, url: &str, body: Option<&Value>) -> Result<Request, FetchError> {
    let parsed = url
        .parse()
        .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    let mut req = Request::new(method, parsed);
    if let Some(body) = body {
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.to_string().into());
    }
    Ok(req)
}

/// Executes `req` and parses the body as JSON.
///
/// An empty body yields [`Value::Null`]. Non-success statuses and bodies that
/// are not JSON are errors carrying the status and a truncated body.
pub async fn send_json<C: HttpClient + ?Sized>(client: &C, req: Request) -> Result<Value, FetchError> {
    let method = req.method().clone();
    let url = req.url().to_string();
    let resp = client.execute(req).await?;
    let status = resp.status();
    let text = resp.text().await?;
    debug!(%method, %url, status = status.as_u16(), bytes = text.len(), "Upstream response");

    if !status.is_success() {
        return Err(FetchError::Status {
            status,
            body: preview(&text),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|_| FetchError::InvalidJson {
        status,
        body: preview(&text),
    })
}

pub async fn fetch_json<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Value, FetchError> {
    let req = build_request(Method::GET, url, None)?;
    send_json(client, req).await
}
