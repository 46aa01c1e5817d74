//! Deployment configuration read from the environment (and `.env`, via
//! `dotenvy` in `main`).

use anyhow::{Context, Result, bail};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_UMO_BASE_URL: &str = "https://webservices.umoiq.com/api/pub/v1";
pub const DEFAULT_AGENCY: &str = "unitrans";
pub const DEFAULT_AGENCY_KEYWORDS: &str = "unitrans,davis";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SEARCH_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for the transit-prediction upstream.
#[derive(Debug, Clone)]
pub struct TransitConfig {
    pub base_url: String,
    pub api_key: String,
    pub agency: String,
    pub agency_keywords: Vec<String>,
    pub search_concurrency: usize,
    pub timeout: Duration,
}

/// Supabase project endpoint and service credentials.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
}

fn first_of(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|&k| lookup(k))
        .find(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        _ => Ok(default),
    }
}

fn timeout(lookup: &impl Fn(&str) -> Option<String>) -> Result<Duration> {
    Ok(Duration::from_secs(parsed(
        lookup,
        "UPSTREAM_TIMEOUT_SECS",
        DEFAULT_TIMEOUT_SECS,
    )?))
}

impl TransitConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = first_of(&lookup, &["UMO_API_KEY"]).unwrap_or_else(|| {
            warn!("UMO_API_KEY is not set; transit requests will likely be rejected");
            String::new()
        });
        let keywords = first_of(&lookup, &["UMO_AGENCY_KEYWORDS"])
            .unwrap_or_else(|| DEFAULT_AGENCY_KEYWORDS.to_string());
        let search_concurrency = parsed(
            &lookup,
            "SEARCH_CONCURRENCY",
            DEFAULT_SEARCH_CONCURRENCY,
        )?;
        if search_concurrency == 0 {
            bail!("SEARCH_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            base_url: first_of(&lookup, &["UMO_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_UMO_BASE_URL.to_string()),
            api_key,
            agency: first_of(&lookup, &["UMO_AGENCY"]).unwrap_or_else(|| DEFAULT_AGENCY.to_string()),
            agency_keywords: keywords
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            search_concurrency,
            timeout: timeout(&lookup)?,
        })
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Fails when the project url or a key is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = first_of(&lookup, &["SUPABASE_URL", "VITE_SUPABASE_URL"]);
        let service_key = first_of(
            &lookup,
            &[
                "SUPABASE_SERVICE_ROLE_KEY",
                "VITE_SUPABASE_ANON",
                "VITE_SUPABASE_PUBLISHABLE_KEY",
            ],
        );
        let (Some(url), Some(service_key)) = (url, service_key) else {
            bail!("Missing Supabase environment variables (SUPABASE_URL, SUPABASE_SERVICE_ROLE_KEY)");
        };

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            service_key,
            timeout: timeout(&lookup)?,
        })
    }
}

pub fn port_from_env() -> Result<u16> {
    parsed(&|k: &str| std::env::var(k).ok(), "PORT", DEFAULT_PORT)
}
