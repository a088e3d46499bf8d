//! Reverse geocoding: coordinates → human readable address.

use crate::config::GeocoderConfig;
use crate::errors::{AppError, AppResult, GeocodeError};
use crate::models::coords::Coordinates;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const OPENCAGE_BASE_URL: &str = "https://api.opencagedata.com/geocode/v1/json";

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the service answered but knows no address.
    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeocodeError>;
}

/// Used when no API key is configured: every lookup degrades to coordinates.
#[derive(Debug, Default)]
pub struct OfflineGeocoder;

#[async_trait]
impl Geocoder for OfflineGeocoder {
    async fn reverse(&self, _coords: Coordinates) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    results: Vec<OpenCageResult>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    formatted: Option<String>,
}

/// OpenCage forward/reverse geocoding API client.
pub struct OpenCageGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenCageGeocoder {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rattendance/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeocodeError> {
        let query = format!("{} {}", coords.latitude, coords.longitude);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body: OpenCageResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Payload(e.to_string()))?;

        let address = body
            .results
            .into_iter()
            .next()
            .and_then(|r| r.formatted)
            .filter(|a| !a.trim().is_empty());

        debug!(found = address.is_some(), "reverse geocoding answered");
        Ok(address)
    }
}

/// Pick the geocoder for a configuration: OpenCage when a key is set,
/// offline otherwise.
pub fn from_config(cfg: &GeocoderConfig) -> AppResult<Arc<dyn Geocoder>> {
    match cfg.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(Arc::new(OpenCageGeocoder::new(
            &cfg.base_url,
            key,
            Duration::from_secs(cfg.timeout_secs),
        )?)),
        _ => Ok(Arc::new(OfflineGeocoder)),
    }
}
